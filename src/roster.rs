/// Actors in the encounter and the statuses they carry.
///
/// Two read-only views are exposed as traits so analyses can be fed from any
/// source of actor data:
///   - `EnemyRegistry` resolves hostile targets (used to validate damage hits)
///   - `Combatants` resolves friendly actors (used for buff inspection)
///
/// `Roster` is the in-memory implementation. It learns status windows from
/// applybuff / removebuff events via `observe`.
use crate::event::{Ability, EventKind, LogEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub trait EnemyRegistry {
    /// The hostile entity with this id, if there is one.
    fn resolve(&self, target_id: i64) -> Option<&Entity>;
}

pub trait Combatants {
    /// The friendly entity with this id, if there is one.
    fn get_entity(&self, id: i64) -> Option<&Entity>;
}

// ---------------------------------------------------------------------------
// Entities and statuses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Friendly,
    Hostile,
}

/// One status window on an entity. `end_ms` is None while still active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub ability:   Ability,
    pub source_id: i64,
    pub start_ms:  u64,
    #[serde(default)]
    pub end_ms:    Option<u64>,
}

impl Status {
    fn overlaps(&self, from_ms: u64, to_ms: u64) -> bool {
        self.start_ms <= to_ms && self.end_ms.map_or(true, |end| end >= from_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id:          i64,
    pub name:        String,
    pub disposition: Disposition,
    /// Job / class label, free-form.
    #[serde(default)]
    pub job:         String,
    #[serde(default)]
    pub statuses:    Vec<Status>,
}

impl Entity {
    pub fn new(id: i64, name: &str, disposition: Disposition) -> Self {
        Self {
            id,
            name: name.to_owned(),
            disposition,
            job: String::new(),
            statuses: Vec::new(),
        }
    }

    pub fn with_job(mut self, job: &str) -> Self {
        self.job = job.to_owned();
        self
    }

    pub fn is_hostile(&self) -> bool {
        self.disposition == Disposition::Hostile
    }

    /// Statuses active at any point in `[at - before, at + after]`.
    ///
    /// `filter` keeps only one status guid; `source_id` keeps only statuses
    /// applied by that actor. Results are ordered by start time.
    pub fn get_statuses(
        &self,
        filter:    Option<u32>,
        at_ms:     u64,
        before_ms: u64,
        after_ms:  u64,
        source_id: Option<i64>,
    ) -> Vec<&Status> {
        let from = at_ms.saturating_sub(before_ms);
        let to   = at_ms.saturating_add(after_ms);

        let mut found: Vec<&Status> = self
            .statuses
            .iter()
            .filter(|s| filter.map_or(true, |guid| s.ability.guid == guid))
            .filter(|s| source_id.map_or(true, |src| s.source_id == src))
            .filter(|s| s.overlaps(from, to))
            .collect();
        found.sort_by_key(|s| s.start_ms);
        found
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Roster {
    entities: HashMap<i64, Entity>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: Vec<Entity>) -> Self {
        let mut roster = Self::new();
        for entity in entities {
            roster.insert(entity);
        }
        roster
    }

    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    pub fn get(&self, id: i64) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Track status windows from the event stream. Other event types are ignored.
    pub fn observe(&mut self, event: &LogEvent) {
        let Some(ability) = event.ability.as_ref() else {
            return;
        };
        let Some(entity) = self.entities.get_mut(&event.target_id) else {
            return;
        };

        match event.kind {
            EventKind::ApplyBuff => {
                entity.statuses.push(Status {
                    ability:   ability.clone(),
                    source_id: event.source_id,
                    start_ms:  event.timestamp_ms,
                    end_ms:    None,
                });
            }
            EventKind::RemoveBuff => {
                let open = entity.statuses.iter_mut().rev().find(|s| {
                    s.end_ms.is_none()
                        && s.ability.guid == ability.guid
                        && s.source_id == event.source_id
                });
                match open {
                    Some(status) => status.end_ms = Some(event.timestamp_ms),
                    None => tracing::trace!(
                        "removebuff {} on {} with no open window",
                        ability.guid, event.target_id
                    ),
                }
            }
            _ => {}
        }
    }
}

impl EnemyRegistry for Roster {
    fn resolve(&self, target_id: i64) -> Option<&Entity> {
        self.entities.get(&target_id).filter(|e| e.is_hostile())
    }
}

impl Combatants for Roster {
    fn get_entity(&self, id: i64) -> Option<&Entity> {
        self.entities.get(&id).filter(|e| !e.is_hostile())
    }
}
