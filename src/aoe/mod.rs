pub mod fabricate;
pub mod tracker;

pub use fabricate::fabricate;
pub use tracker::normalise;

/// Area-of-effect pulse detection.
///
/// Two stages:
///   1. `normalise` scans the raw stream once, groups groupable events by
///      (source, ability) and splits a group into pulses whenever the gap to
///      the previous hit exceeds the type's threshold. One `GroupedPulse` is
///      spliced in right after the last raw event of each pulse.
///   2. `fabricate` turns a `GroupedPulse` into public `aoe<type>` events,
///      one per event type present, with per-target hit counts.
///
/// Thresholds (ms between consecutive hits of one pulse):
///   direct (damage, heal)            → 20
///   status (applybuff, refreshbuff)  → 200
use crate::event::{Ability, EventKind, LogEvent};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseThresholds {
    /// Max gap for damage / heal pulses.
    #[serde(default = "default_direct_ms")]
    pub direct_ms: u64,
    /// Max gap for status application pulses; these land further apart.
    #[serde(default = "default_status_ms")]
    pub status_ms: u64,
}

fn default_direct_ms() -> u64 { 20 }
fn default_status_ms() -> u64 { 200 }

impl Default for PulseThresholds {
    fn default() -> Self {
        Self {
            direct_ms: default_direct_ms(),
            status_ms: default_status_ms(),
        }
    }
}

impl PulseThresholds {
    /// Threshold chosen by the type of the event being added, not the pulse.
    pub fn for_kind(&self, kind: EventKind) -> u64 {
        if kind.is_status() { self.status_ms } else { self.direct_ms }
    }
}

// ---------------------------------------------------------------------------
// Grouped pulses (internal stream items)
// ---------------------------------------------------------------------------

/// A raw event together with its position in the original stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedEvent {
    pub index: usize,
    pub event: LogEvent,
}

/// All events of one type within a pulse, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseGroup {
    pub kind:   EventKind,
    pub events: Vec<SequencedEvent>,
}

/// A completed pulse for one (source, ability) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedPulse {
    pub source_id:    i64,
    pub ability:      Ability,
    /// Earliest timestamp across all groups.
    pub timestamp_ms: u64,
    /// Index of the last raw event of the pulse; the pulse is emitted after it.
    pub insert_after: usize,
    /// Groups in the order their type was first seen.
    pub groups:       Vec<PulseGroup>,
}

impl GroupedPulse {
    pub fn hit_count(&self) -> usize {
        self.groups.iter().map(|g| g.events.len()).sum()
    }
}

/// Output of `normalise`: the original events with pulses interleaved.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Log(LogEvent),
    Pulse(GroupedPulse),
}

impl StreamEvent {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Self::Log(e)   => e.timestamp_ms,
            Self::Pulse(p) => p.timestamp_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Fabricated events (public)
// ---------------------------------------------------------------------------

/// One distinct target hit within a pulse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AoeHit {
    pub id:       i64,
    pub instance: u32,
    pub times:    u32,
}

/// Fabricated event summarising one event type of one pulse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AoeEvent {
    /// Type of the raw events this summarises. Serialised as the public
    /// tag, `"type": "aoedamage"`.
    #[serde(rename = "type", with = "aoe_tag")]
    pub kind:         EventKind,
    pub timestamp_ms: u64,
    pub source_id:    i64,
    pub ability:      Ability,
    /// Distinct targets in first-seen order.
    pub hits:         Vec<AoeHit>,
}

impl AoeEvent {
    /// Public type tag, e.g. "aoedamage", "aoerefreshbuff".
    pub fn type_name(&self) -> String {
        format!("aoe{}", self.kind.as_str())
    }

    pub fn target_count(&self) -> usize {
        self.hits.len()
    }
}

mod aoe_tag {
    use crate::event::EventKind;
    use serde::de::{Error, IntoDeserializer};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(kind: &EventKind, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&format_args!("aoe{}", kind.as_str()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<EventKind, D::Error> {
        let tag = String::deserialize(d)?;
        let raw = tag
            .strip_prefix("aoe")
            .ok_or_else(|| D::Error::custom(format!("not an aoe type: {}", tag)))?;
        EventKind::deserialize(IntoDeserializer::<D::Error>::into_deserializer(raw))
    }
}
