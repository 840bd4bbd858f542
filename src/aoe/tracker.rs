/// Normalisation pass: group raw hits into pulses and splice them back in.
///
/// A tracker per (source, ability) accumulates hits. When the next hit for
/// that pair arrives more than the threshold after the tracker's latest hit,
/// the accumulated hits are flushed as one pulse and the tracker restarts
/// from the new hit. Every tracker still holding hits at end of stream is
/// flushed once.
///
/// The whole stream must be in memory: pulses are placed after the last raw
/// event they contain, which is only known once the pulse has closed.
use super::{GroupedPulse, PulseGroup, PulseThresholds, SequencedEvent, StreamEvent};
use crate::event::{Ability, LogEvent};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackerKey {
    pub source_id:  i64,
    pub ability_id: u32,
}

#[derive(Debug)]
struct Tracker {
    key:          TrackerKey,
    ability:      Ability,
    groups:       Vec<PulseGroup>,
    insert_after: usize,
}

impl Tracker {
    fn new(key: TrackerKey, ability: Ability) -> Self {
        Self { key, ability, groups: Vec::new(), insert_after: 0 }
    }

    /// Latest timestamp across all groups. None = no pending hits.
    fn last_hit_ms(&self) -> Option<u64> {
        self.groups
            .iter()
            .filter_map(|g| g.events.last())
            .map(|e| e.event.timestamp_ms)
            .max()
    }

    fn first_hit_ms(&self) -> Option<u64> {
        self.groups
            .iter()
            .filter_map(|g| g.events.first())
            .map(|e| e.event.timestamp_ms)
            .min()
    }

    fn push(&mut self, index: usize, event: &LogEvent) {
        let hit = SequencedEvent { index, event: event.clone() };
        match self.groups.iter_mut().find(|g| g.kind == event.kind) {
            Some(group) => group.events.push(hit),
            None => self.groups.push(PulseGroup { kind: event.kind, events: vec![hit] }),
        }
        self.insert_after = index;
    }

    /// Take the pending hits as a pulse and reset. None if nothing is pending.
    fn flush(&mut self) -> Option<GroupedPulse> {
        let timestamp_ms = self.first_hit_ms()?;
        Some(GroupedPulse {
            source_id:    self.key.source_id,
            ability:      self.ability.clone(),
            timestamp_ms,
            insert_after: self.insert_after,
            groups:       std::mem::take(&mut self.groups),
        })
    }
}

/// Run the pulse pass over an ordered event stream.
///
/// Original events come back unchanged and in their original order; each
/// completed pulse is inserted directly after its last raw event.
pub fn normalise(events: Vec<LogEvent>, thresholds: &PulseThresholds) -> Vec<StreamEvent> {
    let mut trackers: HashMap<TrackerKey, Tracker> = HashMap::new();
    let mut pending:  Vec<GroupedPulse>           = Vec::new();
    let mut skipped_no_ability = 0usize;

    for (index, event) in events.iter().enumerate() {
        if !event.kind.is_groupable() {
            continue;
        }

        // No ability → nothing to key on. Scanned, never grouped.
        let Some(ability) = event.ability.as_ref() else {
            skipped_no_ability += 1;
            continue;
        };

        let key = TrackerKey { source_id: event.source_id, ability_id: ability.guid };
        let tracker = trackers
            .entry(key)
            .or_insert_with(|| Tracker::new(key, ability.clone()));

        let threshold = thresholds.for_kind(event.kind);
        if let Some(last_hit) = tracker.last_hit_ms() {
            // saturating: an out-of-order event never opens a new pulse
            if event.timestamp_ms.saturating_sub(last_hit) > threshold {
                pending.extend(tracker.flush());
            }
        }

        tracker.push(index, event);
    }

    // End of stream: every tracker with hits left produces exactly one pulse
    for tracker in trackers.values_mut() {
        pending.extend(tracker.flush());
    }

    tracing::debug!(
        "normalise: {} events, {} trackers, {} pulses, {} ungroupable (no ability)",
        events.len(),
        trackers.len(),
        pending.len(),
        skipped_no_ability,
    );

    splice(events, pending)
}

/// Merge pulses into the stream by position in a single pass.
fn splice(events: Vec<LogEvent>, mut pending: Vec<GroupedPulse>) -> Vec<StreamEvent> {
    pending.sort_by_key(|p| p.insert_after);

    let mut out = Vec::with_capacity(events.len() + pending.len());
    let mut pending = pending.into_iter().peekable();

    for (index, event) in events.into_iter().enumerate() {
        out.push(StreamEvent::Log(event));
        while let Some(pulse) = pending.next_if(|p| p.insert_after == index) {
            out.push(StreamEvent::Pulse(pulse));
        }
    }
    out
}
