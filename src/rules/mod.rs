pub mod rule;

pub use rule::{Rule, RuleConfig, RuleResult, Scoring};

/// Checklist scoring.
///
/// A `Rule` is a named set of requirements, each scored 0–100. The rule's
/// percent is the mean of its requirements and maps to a `Tier` through a
/// threshold table: the tier of the greatest threshold not above the percent.
/// Below every threshold there is no tier, which callers treat as a fail.
use serde::{Deserialize, Serialize};

/// Passing classifications. A fail is the absence of a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Warn    = 1,
    Success = 2,
}

/// One sub-requirement of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub name:    String,
    /// 0–100.
    pub percent: f64,
}

impl Requirement {
    pub fn new(name: impl Into<String>, percent: f64) -> Self {
        Self { name: name.into(), percent }
    }

    /// `value` out of `target`, as a percent clamped to 0–100.
    /// A non-positive target scores 0.
    pub fn from_ratio(name: impl Into<String>, value: f64, target: f64) -> Self {
        let percent = if target > 0.0 {
            (value / target * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self::new(name, percent)
    }
}

/// One row of a tier table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierEntry {
    pub threshold: f64,
    pub tier:      Tier,
}

impl TierEntry {
    pub fn new(threshold: f64, tier: Tier) -> Self {
        Self { threshold, tier }
    }
}

/// Strategy mapping a value onto a tier table.
pub trait TierMatcher {
    fn match_tier(&self, tiers: &[TierEntry], value: f64) -> Option<Tier>;
}

impl<F> TierMatcher for F
where
    F: Fn(&[TierEntry], f64) -> Option<Tier>,
{
    fn match_tier(&self, tiers: &[TierEntry], value: f64) -> Option<Tier> {
        self(tiers, value)
    }
}

/// Tier of the greatest threshold ≤ `value`; None if every threshold is above it.
///
/// Equal thresholds resolve to the first entry in table order. A NaN value
/// matches nothing.
pub fn match_closest_lower(tiers: &[TierEntry], value: f64) -> Option<Tier> {
    let mut best: Option<&TierEntry> = None;
    for entry in tiers {
        if !(entry.threshold <= value) {
            continue;
        }
        match best {
            Some(b) if b.threshold >= entry.threshold => {}
            _ => best = Some(entry),
        }
    }
    best.map(|e| e.tier)
}
