/// Encounter analysis driver.
///
/// One call analyses one encounter:
///   1. warn (do not fail) if the stream is not time-ordered
///   2. feed every raw event to the roster so status windows are complete
///   3. normalise the stream into raw events + grouped pulses
///   4. walk the result in order: raw events and fabricated aoe events both
///      go to the analyses, so downstream code sees one chronological stream
///   5. score the checklist
///
/// Single-threaded and synchronous; all state is owned by the call.
use crate::{
    aoe::{fabricate, normalise, AoeEvent, StreamEvent},
    config::AnalysisConfig,
    event::{check_ordering, LogEvent},
    extensions::{self, BuffExtensions, ExtensionUse},
    roster::{Entity, Roster},
    rules::{Rule, RuleConfig, RuleResult, Tier, TierEntry},
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Item of the analysed stream: a raw event or a fabricated one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", rename_all = "lowercase")]
pub enum AnalysisEvent {
    Log(LogEvent),
    Aoe(AoeEvent),
}

impl AnalysisEvent {
    /// Type tag as subscribers see it: "damage", "aoedamage", ...
    pub fn type_name(&self) -> String {
        match self {
            Self::Log(e) => e.kind.as_str().to_owned(),
            Self::Aoe(e) => e.type_name(),
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Self::Log(e) => e.timestamp_ms,
            Self::Aoe(e) => e.timestamp_ms,
        }
    }
}

/// Input fixture for one encounter: the actors and the ordered event list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Encounter {
    #[serde(default)]
    pub actors: Vec<Entity>,
    #[serde(default)]
    pub events: Vec<LogEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub events:     Vec<AnalysisEvent>,
    pub extensions: Vec<ExtensionUse>,
    pub checklist:  Vec<RuleResult>,
}

impl Analysis {
    pub fn aoe_events(&self) -> impl Iterator<Item = &AoeEvent> {
        self.events.iter().filter_map(|e| match e {
            AnalysisEvent::Aoe(aoe) => Some(aoe),
            AnalysisEvent::Log(_)   => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub fn run(events: Vec<LogEvent>, mut roster: Roster, config: &AnalysisConfig) -> Analysis {
    if let Err(e) = check_ordering(&events) {
        tracing::warn!("Event stream out of order, pulses may be wrong: {}", e);
    }

    for event in &events {
        roster.observe(event);
    }

    let stream = normalise(events, &config.pulse);
    let mut buff_extensions = BuffExtensions::new(config.extensions.clone());
    let mut out = Vec::with_capacity(stream.len());

    for item in stream {
        match item {
            StreamEvent::Log(event) => {
                buff_extensions.on_log(&event, &roster);
                out.push(AnalysisEvent::Log(event));
            }
            StreamEvent::Pulse(pulse) => {
                for aoe in fabricate(&pulse, &roster) {
                    buff_extensions.on_aoe(&aoe, &roster);
                    out.push(AnalysisEvent::Aoe(aoe));
                }
            }
        }
    }

    let extension_uses = buff_extensions.complete();
    let checklist = build_checklist(config, &extension_uses)
        .iter()
        .map(Rule::result)
        .collect();

    tracing::info!(
        "Analysis complete: {} stream events, {} extension uses",
        out.len(),
        extension_uses.len()
    );

    Analysis { events: out, extensions: extension_uses, checklist }
}

/// Built-in rules first, then the configured ones in file order.
fn build_checklist(config: &AnalysisConfig, extension_uses: &[ExtensionUse]) -> Vec<Rule> {
    let mut rules = Vec::with_capacity(config.checklist.len() + 1);

    if let Some(req) = extensions::requirement(extension_uses) {
        rules.push(Rule::new(RuleConfig {
            name:         "Use buff extensions on buffed allies".to_owned(),
            description:  Some("Extensions should land while allies carry buffs worth extending.".to_owned()),
            requirements: vec![req],
            tiers:        Some(vec![
                TierEntry::new(95.0, Tier::Success),
                TierEntry::new(50.0, Tier::Warn),
            ]),
            ..Default::default()
        }));
    }

    rules.extend(config.checklist.iter().cloned().map(Rule::new));
    rules
}
