/// Structured combat log events as handed over by the ingestion layer.
///
/// Events arrive already parsed and sorted ascending by timestamp (ties keep
/// emission order). Nothing in this crate mutates an event once produced;
/// the pulse clusterer only clones events into grouped pulses.
///
/// JSON shape (one event):
///   { "type": "damage", "timestamp_ms": 1200, "source_id": 1, "target_id": 40,
///     "target_instance": 1, "ability": { "guid": 7447, "name": "Fire" }, "amount": 3150 }
use crate::error::StreamError;
use serde::{Deserialize, Serialize};

/// Event type discriminant. Serialized lowercase, matching the log source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Damage,
    Heal,
    ApplyBuff,
    RefreshBuff,
    RemoveBuff,
    Cast,
    Death,
    /// Anything the log source emits that we have no name for.
    #[serde(other)]
    Unknown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Damage      => "damage",
            Self::Heal        => "heal",
            Self::ApplyBuff   => "applybuff",
            Self::RefreshBuff => "refreshbuff",
            Self::RemoveBuff  => "removebuff",
            Self::Cast        => "cast",
            Self::Death       => "death",
            Self::Unknown     => "unknown",
        }
    }

    /// Types that take part in pulse clustering. Everything else passes through.
    pub fn is_groupable(&self) -> bool {
        matches!(self, Self::Damage | Self::Heal | Self::RefreshBuff | Self::ApplyBuff)
    }

    /// Status application types. These pulse with a wider gap than direct hits.
    pub fn is_status(&self) -> bool {
        matches!(self, Self::RefreshBuff | Self::ApplyBuff)
    }
}

/// Ability (or status) reference carried by an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub guid: u32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "type")]
    pub kind:            EventKind,
    pub timestamp_ms:    u64,
    #[serde(default)]
    pub source_id:       i64,
    #[serde(default)]
    pub target_id:       i64,
    /// Disambiguates several actors sharing one id (e.g. summons).
    #[serde(default = "default_instance")]
    pub target_instance: u32,
    #[serde(default)]
    pub ability:         Option<Ability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount:          Option<u64>,
}

fn default_instance() -> u32 { 1 }

impl LogEvent {
    pub fn new(kind: EventKind, timestamp_ms: u64, source_id: i64, target_id: i64) -> Self {
        Self {
            kind,
            timestamp_ms,
            source_id,
            target_id,
            target_instance: default_instance(),
            ability: None,
            amount: None,
        }
    }

    pub fn with_ability(mut self, guid: u32, name: &str) -> Self {
        self.ability = Some(Ability { guid, name: name.to_owned() });
        self
    }

    pub fn with_instance(mut self, instance: u32) -> Self {
        self.target_instance = instance;
        self
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn ability_id(&self) -> Option<u32> {
        self.ability.as_ref().map(|a| a.guid)
    }
}

/// Check the stream is sorted ascending by timestamp.
///
/// Returns the first offending position. Callers decide whether that is
/// fatal; the engine only logs it.
pub fn check_ordering(events: &[LogEvent]) -> Result<(), StreamError> {
    for (index, pair) in events.windows(2).enumerate() {
        if pair[1].timestamp_ms < pair[0].timestamp_ms {
            return Err(StreamError::OutOfOrder {
                index:        index + 1,
                timestamp_ms: pair[1].timestamp_ms,
                previous_ms:  pair[0].timestamp_ms,
            });
        }
    }
    Ok(())
}
