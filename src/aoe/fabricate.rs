/// Turns a completed pulse into public `aoe<type>` events.
///
/// Per event type in the pulse:
///   - damage hits on targets the enemy registry cannot resolve are dropped
///   - remaining hits collapse by (target id, instance) with a hit count
///   - one `AoeEvent` is emitted, carrying the ability and source of the
///     type's first raw event
use super::{AoeEvent, AoeHit, GroupedPulse};
use crate::{event::EventKind, roster::EnemyRegistry};
use std::collections::HashMap;

pub fn fabricate<R>(pulse: &GroupedPulse, enemies: &R) -> Vec<AoeEvent>
where
    R: EnemyRegistry + ?Sized,
{
    let mut out = Vec::with_capacity(pulse.groups.len());

    for group in &pulse.groups {
        let Some(first) = group.events.first() else {
            continue;
        };

        let mut hits: Vec<AoeHit> = Vec::new();
        let mut slot: HashMap<(i64, u32), usize> = HashMap::new();
        let mut dropped = 0u32;

        for hit in &group.events {
            let e = &hit.event;
            if group.kind == EventKind::Damage && enemies.resolve(e.target_id).is_none() {
                dropped += 1;
                continue;
            }

            let key = (e.target_id, e.target_instance);
            match slot.get(&key) {
                Some(&i) => hits[i].times += 1,
                None => {
                    slot.insert(key, hits.len());
                    hits.push(AoeHit { id: e.target_id, instance: e.target_instance, times: 1 });
                }
            }
        }

        if dropped > 0 {
            tracing::trace!(
                "fabricate: dropped {} {} hits on unknown targets (source {}, ability {})",
                dropped, group.kind.as_str(), pulse.source_id, pulse.ability.guid
            );
        }

        out.push(AoeEvent {
            kind:         group.kind,
            timestamp_ms: pulse.timestamp_ms,
            source_id:    first.event.source_id,
            ability:      first.event.ability.clone().unwrap_or_else(|| pulse.ability.clone()),
            hits,
        });
    }

    out
}
