/// Buff extension tracking.
///
/// Records uses of two kinds of extension abilities and which buffs each
/// affected ally was carrying at the time:
///
///   single — one cast on one target. The target's statuses around the cast
///            are captured immediately.
///   area   — the cast opens a chain. Every `aoerefreshbuff` pulse from the
///            caster joins it until a pulse lands later than
///            `cast + lead_time + pulse_allowance × targets so far`.
///
/// The area cast is logged well before the first refresh lands, hence the
/// lead time. Each extra target adds one pulse allowance because refreshes
/// spread over the party one after another.
use crate::{
    aoe::AoeEvent,
    event::{EventKind, LogEvent},
    roster::{Combatants, Status},
    rules::Requirement,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSettings {
    /// Ability extending every buff on one target. None = not tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_target_ability_id: Option<u32>,
    /// Ability extending buffs across the party. None = not tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_ability_id:          Option<u32>,
    /// Status guids never reported as extended (own cards, mitigation, ...).
    #[serde(default)]
    pub ignored_status_ids:       Vec<u32>,
    #[serde(default = "default_lead_time_ms")]
    pub lead_time_ms:             u64,
    #[serde(default = "default_pulse_allowance_ms")]
    pub pulse_allowance_ms:       u64,
    /// Statuses are looked up this far either side of the extension.
    #[serde(default = "default_status_window_ms")]
    pub status_window_ms:         u64,
}

fn default_lead_time_ms() -> u64 { 1_500 }
fn default_pulse_allowance_ms() -> u64 { 200 }
fn default_status_window_ms() -> u64 { 1_000 }

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            single_target_ability_id: None,
            area_ability_id:          None,
            ignored_status_ids:       Vec::new(),
            lead_time_ms:             default_lead_time_ms(),
            pulse_allowance_ms:       default_pulse_allowance_ms(),
            status_window_ms:         default_status_window_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    Single,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedTarget {
    pub id:    i64,
    pub name:  String,
    pub job:   String,
    pub buffs: Vec<Status>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionUse {
    pub kind:    ExtensionKind,
    pub cast:    LogEvent,
    pub targets: Vec<ExtendedTarget>,
}

impl ExtensionUse {
    pub fn buffs_extended(&self) -> usize {
        self.targets.iter().map(|t| t.buffs.len()).sum()
    }
}

#[derive(Debug)]
pub struct BuffExtensions {
    settings: ExtensionSettings,
    uses:     Vec<ExtensionUse>,
    chain:    Option<ExtensionUse>,
}

impl BuffExtensions {
    pub fn new(settings: ExtensionSettings) -> Self {
        Self { settings, uses: Vec::new(), chain: None }
    }

    pub fn on_log<C: Combatants + ?Sized>(&mut self, event: &LogEvent, combatants: &C) {
        if event.kind != EventKind::Cast {
            return;
        }
        let Some(ability_id) = event.ability_id() else {
            return;
        };

        if Some(ability_id) == self.settings.single_target_ability_id {
            // Pets live outside the combatant list; nothing to inspect
            let Some(target) =
                self.inspect(event.target_id, event.timestamp_ms, event.source_id, combatants)
            else {
                return;
            };
            self.uses.push(ExtensionUse {
                kind:    ExtensionKind::Single,
                cast:    event.clone(),
                targets: vec![target],
            });
        } else if Some(ability_id) == self.settings.area_ability_id {
            self.end_chain();
            self.chain = Some(ExtensionUse {
                kind:    ExtensionKind::Area,
                cast:    event.clone(),
                targets: Vec::new(),
            });
        }
    }

    pub fn on_aoe<C: Combatants + ?Sized>(&mut self, aoe: &AoeEvent, combatants: &C) {
        if aoe.kind != EventKind::RefreshBuff {
            return;
        }
        let Some(chain) = self.chain.as_ref() else {
            return;
        };
        if aoe.source_id != chain.cast.source_id {
            return;
        }

        let allowance = self
            .settings
            .pulse_allowance_ms
            .saturating_mul(chain.targets.len() as u64);
        let deadline = chain
            .cast
            .timestamp_ms
            .saturating_add(self.settings.lead_time_ms)
            .saturating_add(allowance);
        if aoe.timestamp_ms > deadline {
            self.end_chain();
            return;
        }

        let fresh: Vec<ExtendedTarget> = aoe
            .hits
            .iter()
            .filter(|hit| !chain.targets.iter().any(|t| t.id == hit.id))
            // buffs as they stood when the refresh landed, not at the cast
            .filter_map(|hit| self.inspect(hit.id, aoe.timestamp_ms, aoe.source_id, combatants))
            .collect();

        if let Some(chain) = self.chain.as_mut() {
            for target in fresh {
                if !chain.targets.iter().any(|t| t.id == target.id) {
                    chain.targets.push(target);
                }
            }
        }
    }

    /// Close any open chain and return uses in cast order with buffs sorted by guid.
    pub fn complete(mut self) -> Vec<ExtensionUse> {
        self.end_chain();

        self.uses.sort_by_key(|u| u.cast.timestamp_ms);
        for u in &mut self.uses {
            for target in &mut u.targets {
                target.buffs.sort_by_key(|s| s.ability.guid);
            }
        }
        tracing::debug!("buff extensions: {} uses", self.uses.len());
        self.uses
    }

    fn end_chain(&mut self) {
        if let Some(chain) = self.chain.take() {
            tracing::trace!(
                "extension chain at {}ms closed with {} targets",
                chain.cast.timestamp_ms,
                chain.targets.len()
            );
            self.uses.push(chain);
        }
    }

    fn inspect<C: Combatants + ?Sized>(
        &self,
        target_id:  i64,
        at_ms:      u64,
        source_id:  i64,
        combatants: &C,
    ) -> Option<ExtendedTarget> {
        let entity = combatants.get_entity(target_id)?;
        let window = self.settings.status_window_ms;
        let buffs = entity
            .get_statuses(None, at_ms, window, window, Some(source_id))
            .into_iter()
            .filter(|s| !self.settings.ignored_status_ids.contains(&s.ability.guid))
            .cloned()
            .collect();

        Some(ExtendedTarget {
            id:   entity.id,
            name: entity.name.clone(),
            job:  entity.job.clone(),
            buffs,
        })
    }
}

/// Share of uses that extended at least one buff. None when there were no uses.
pub fn requirement(uses: &[ExtensionUse]) -> Option<Requirement> {
    if uses.is_empty() {
        return None;
    }
    let useful = uses.iter().filter(|u| u.buffs_extended() > 0).count();
    Some(Requirement::from_ratio(
        "Extensions that extended a buff",
        useful as f64,
        uses.len() as f64,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::aoe::AoeHit;
    use crate::event::Ability;
    use crate::roster::{Disposition, Entity, Roster};

    const DILATION:    u32 = 3_490;
    const OPPOSITION:  u32 = 16_553;
    const ASPECTED:    u32 = 835;
    const CARD:        u32 = 1_882;
    const HOROSCOPE:   u32 = 1_890;

    const ASTRO:  i64 = 1;
    const TANK:   i64 = 2;
    const MELEE:  i64 = 3;
    const CASTER: i64 = 4;
    const BOSS:   i64 = 100;

    fn settings() -> ExtensionSettings {
        ExtensionSettings {
            single_target_ability_id: Some(DILATION),
            area_ability_id:          Some(OPPOSITION),
            ignored_status_ids:       vec![CARD],
            ..Default::default()
        }
    }

    fn roster() -> Roster {
        let mut r = Roster::from_entities(vec![
            Entity::new(ASTRO, "Astro", Disposition::Friendly).with_job("Astrologian"),
            Entity::new(TANK, "Tank", Disposition::Friendly).with_job("Paladin"),
            Entity::new(MELEE, "Melee", Disposition::Friendly).with_job("Monk"),
            Entity::new(CASTER, "Caster", Disposition::Friendly).with_job("Summoner"),
            Entity::new(BOSS, "Boss", Disposition::Hostile),
        ]);
        for target in [TANK, MELEE] {
            for guid in [ASPECTED, CARD, HOROSCOPE] {
                r.observe(&LogEvent::new(EventKind::ApplyBuff, 1_000, ASTRO, target).with_ability(guid, ""));
            }
        }
        r
    }

    fn cast(ts: u64, guid: u32, target: i64) -> LogEvent {
        LogEvent::new(EventKind::Cast, ts, ASTRO, target).with_ability(guid, "")
    }

    fn refresh_pulse(ts: u64, guid: u32, targets: &[i64]) -> AoeEvent {
        AoeEvent {
            kind:         EventKind::RefreshBuff,
            timestamp_ms: ts,
            source_id:    ASTRO,
            ability:      Ability { guid, name: String::new() },
            hits:         targets.iter().map(|&id| AoeHit { id, instance: 1, times: 1 }).collect(),
        }
    }

    #[test]
    fn single_target_extension_captures_buffs() {
        let r = roster();
        let mut ext = BuffExtensions::new(settings());
        ext.on_log(&cast(2_000, DILATION, TANK), &r);

        let uses = ext.complete();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].kind, ExtensionKind::Single);
        assert_eq!(uses[0].targets[0].name, "Tank");
        let guids: Vec<u32> = uses[0].targets[0].buffs.iter().map(|s| s.ability.guid).collect();
        assert_eq!(guids, vec![ASPECTED, HOROSCOPE], "card is ignored, order by guid");
    }

    #[test]
    fn single_target_on_unknown_actor_is_skipped() {
        let r = roster();
        let mut ext = BuffExtensions::new(settings());
        ext.on_log(&cast(2_000, DILATION, 777), &r);
        assert!(ext.complete().is_empty());
    }

    #[test]
    fn area_chain_collects_pulses_in_window() {
        let r = roster();
        let mut ext = BuffExtensions::new(settings());
        ext.on_log(&cast(2_000, OPPOSITION, ASTRO), &r);
        // deadline with 0 targets: 2000 + 1500
        ext.on_aoe(&refresh_pulse(3_400, ASPECTED, &[TANK, MELEE]), &r);
        // deadline with 2 targets: 3500 + 400 = 3900
        ext.on_aoe(&refresh_pulse(3_850, HOROSCOPE, &[MELEE, CASTER, BOSS]), &r);

        let uses = ext.complete();
        assert_eq!(uses.len(), 1);
        let ids: Vec<i64> = uses[0].targets.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TANK, MELEE, CASTER], "deduped, hostile skipped");
        assert!(uses[0].targets[2].buffs.is_empty());
    }

    #[test]
    fn area_chain_reads_buffs_at_refresh_time() {
        let mut r = Roster::from_entities(vec![
            Entity::new(ASTRO, "Astro", Disposition::Friendly),
            Entity::new(TANK, "Tank", Disposition::Friendly),
        ]);
        r.observe(&LogEvent::new(EventKind::ApplyBuff, 0, ASTRO, TANK).with_ability(ASPECTED, ""));
        r.observe(&LogEvent::new(EventKind::RemoveBuff, 1_500, ASTRO, TANK).with_ability(ASPECTED, ""));

        let mut ext = BuffExtensions::new(settings());
        // buff is inside the window around the cast but gone by the refresh
        ext.on_log(&cast(2_000, OPPOSITION, ASTRO), &r);
        ext.on_aoe(&refresh_pulse(3_400, ASPECTED, &[TANK]), &r);

        let uses = ext.complete();
        assert_eq!(uses[0].targets.len(), 1);
        assert_eq!(uses[0].buffs_extended(), 0);
    }

    #[test]
    fn huge_lead_time_saturates() {
        let r = roster();
        let mut ext = BuffExtensions::new(ExtensionSettings {
            lead_time_ms:       u64::MAX,
            pulse_allowance_ms: u64::MAX,
            ..settings()
        });
        ext.on_log(&cast(2_000, OPPOSITION, ASTRO), &r);
        ext.on_aoe(&refresh_pulse(3_400, ASPECTED, &[TANK]), &r);
        ext.on_aoe(&refresh_pulse(u64::MAX, ASPECTED, &[MELEE]), &r);

        let uses = ext.complete();
        let ids: Vec<i64> = uses[0].targets.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TANK, MELEE]);
    }

    #[test]
    fn late_pulse_closes_chain() {
        let r = roster();
        let mut ext = BuffExtensions::new(settings());
        ext.on_log(&cast(2_000, OPPOSITION, ASTRO), &r);
        ext.on_aoe(&refresh_pulse(3_501, ASPECTED, &[TANK]), &r);
        ext.on_aoe(&refresh_pulse(3_502, ASPECTED, &[MELEE]), &r);

        let uses = ext.complete();
        assert_eq!(uses.len(), 1);
        assert!(uses[0].targets.is_empty());
        assert_eq!(requirement(&uses).unwrap().percent, 0.0);
    }

    #[test]
    fn pulses_from_other_sources_are_ignored() {
        let r = roster();
        let mut ext = BuffExtensions::new(settings());
        ext.on_log(&cast(2_000, OPPOSITION, ASTRO), &r);
        let mut pulse = refresh_pulse(2_500, ASPECTED, &[TANK]);
        pulse.source_id = TANK;
        ext.on_aoe(&pulse, &r);
        assert!(ext.complete()[0].targets.is_empty());
    }

    #[test]
    fn uses_come_back_in_cast_order() {
        let r = roster();
        let mut ext = BuffExtensions::new(settings());
        ext.on_log(&cast(5_000, OPPOSITION, ASTRO), &r);
        ext.on_log(&cast(6_000, DILATION, TANK), &r);
        // a second area cast closes the first chain
        ext.on_log(&cast(9_000, OPPOSITION, ASTRO), &r);

        let uses = ext.complete();
        let order: Vec<(ExtensionKind, u64)> = uses.iter().map(|u| (u.kind, u.cast.timestamp_ms)).collect();
        assert_eq!(
            order,
            vec![
                (ExtensionKind::Area,   5_000),
                (ExtensionKind::Single, 6_000),
                (ExtensionKind::Area,   9_000),
            ]
        );
    }

    #[test]
    fn untracked_when_unconfigured() {
        let r = roster();
        let mut ext = BuffExtensions::new(ExtensionSettings::default());
        ext.on_log(&cast(2_000, DILATION, TANK), &r);
        ext.on_log(&cast(2_000, OPPOSITION, ASTRO), &r);
        assert!(ext.complete().is_empty());
    }

    #[test]
    fn requirement_counts_useful_uses() {
        let r = roster();
        let mut ext = BuffExtensions::new(settings());
        ext.on_log(&cast(2_000, DILATION, TANK), &r);
        ext.on_log(&cast(3_000, DILATION, CASTER), &r);
        let uses = ext.complete();
        assert_eq!(requirement(&uses).unwrap().percent, 50.0);
        assert!(requirement(&[]).is_none());
    }
}
