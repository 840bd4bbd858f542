/// Rule construction and scoring.
///
/// Rules come from a `RuleConfig` (built in code or read from the checklist
/// section of config.toml). With `tiers` set the rule is tiered and scores
/// through its matcher; otherwise it has a single success target (default 95).
///
/// TOML form:
///   [[checklist]]
///   name   = "Keep Regen rolling"
///   target = 90
///   [[checklist.requirements]]
///   name    = "Regen uptime"
///   percent = 92.5
use super::{match_closest_lower, Requirement, Tier, TierEntry, TierMatcher};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TARGET: f64 = 95.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub name:         String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description:  Option<String>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target:       Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers:        Option<Vec<TierEntry>>,
    /// Keys this crate does not interpret. Kept so callers can read them back.
    #[serde(flatten)]
    pub extra:        toml::Table,
}

/// How a rule turns its percent into a tier.
pub enum Scoring {
    /// Single threshold mapping to `Tier::Success`.
    Target(f64),
    Tiered {
        tiers:   Vec<TierEntry>,
        matcher: Box<dyn TierMatcher + Send + Sync>,
    },
}

impl fmt::Debug for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target(t) => f.debug_tuple("Target").field(t).finish(),
            Self::Tiered { tiers, .. } => f
                .debug_struct("Tiered")
                .field("tiers", tiers)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug)]
pub struct Rule {
    pub name:         String,
    pub description:  Option<String>,
    pub requirements: Vec<Requirement>,
    pub scoring:      Scoring,
    pub extra:        toml::Table,
}

/// Scored snapshot of a rule, handed to the reporting layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub name:        String,
    pub description: Option<String>,
    pub percent:     f64,
    pub tier:        Option<Tier>,
}

impl Rule {
    pub fn new(config: RuleConfig) -> Self {
        let scoring = match config.tiers {
            Some(tiers) => Scoring::Tiered { tiers, matcher: Box::new(match_closest_lower) },
            None => Scoring::Target(config.target.unwrap_or(DEFAULT_TARGET)),
        };
        Self {
            name:         config.name,
            description:  config.description,
            requirements: config.requirements,
            scoring,
            extra:        config.extra,
        }
    }

    /// Swap in a custom matcher. A single-target rule becomes tiered over
    /// `{target → Success}`.
    pub fn with_matcher<M>(mut self, matcher: M) -> Self
    where
        M: TierMatcher + Send + Sync + 'static,
    {
        let tiers = match self.scoring {
            Scoring::Target(target) => vec![TierEntry::new(target, Tier::Success)],
            Scoring::Tiered { tiers, .. } => tiers,
        };
        self.scoring = Scoring::Tiered { tiers, matcher: Box::new(matcher) };
        self
    }

    /// Mean of requirement percents; 0 with no requirements.
    pub fn percent(&self) -> f64 {
        if self.requirements.is_empty() {
            return 0.0;
        }
        let total: f64 = self.requirements.iter().map(|r| r.percent).sum();
        total / self.requirements.len() as f64
    }

    /// None means the rule failed.
    pub fn tier(&self) -> Option<Tier> {
        let percent = self.percent();
        match &self.scoring {
            Scoring::Target(target) => {
                match_closest_lower(&[TierEntry::new(*target, Tier::Success)], percent)
            }
            Scoring::Tiered { tiers, matcher } => matcher.match_tier(tiers, percent),
        }
    }

    pub fn result(&self) -> RuleResult {
        RuleResult {
            name:        self.name.clone(),
            description: self.description.clone(),
            percent:     self.percent(),
            tier:        self.tier(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    fn reqs(percents: &[f64]) -> Vec<Requirement> {
        percents
            .iter()
            .enumerate()
            .map(|(i, p)| Requirement::new(format!("req {}", i), *p))
            .collect()
    }

    fn tiered(percents: &[f64]) -> Rule {
        Rule::new(RuleConfig {
            name:         "Tiered".to_owned(),
            requirements: reqs(percents),
            tiers:        Some(vec![
                TierEntry::new(95.0, Tier::Success),
                TierEntry::new(50.0, Tier::Warn),
            ]),
            ..Default::default()
        })
    }

    #[test]
    fn percent_is_mean_of_requirements() {
        let rule = Rule::new(RuleConfig { requirements: reqs(&[100.0, 80.0, 60.0]), ..Default::default() });
        assert_eq!(rule.percent(), 80.0);
    }

    #[test]
    fn empty_rule_scores_zero_and_fails() {
        let rule = Rule::new(RuleConfig::default());
        assert_eq!(rule.percent(), 0.0);
        assert_eq!(rule.tier(), None);
    }

    #[test]
    fn simple_rule_uses_default_target() {
        let pass = Rule::new(RuleConfig { requirements: reqs(&[95.0]), ..Default::default() });
        assert_eq!(pass.tier(), Some(Tier::Success));

        let fail = Rule::new(RuleConfig { requirements: reqs(&[94.9]), ..Default::default() });
        assert_eq!(fail.tier(), None);
    }

    #[test]
    fn simple_rule_custom_target() {
        let rule = Rule::new(RuleConfig {
            requirements: reqs(&[70.0, 80.0]),
            target:       Some(75.0),
            ..Default::default()
        });
        assert_eq!(rule.tier(), Some(Tier::Success));
    }

    #[test]
    fn tiered_rule_lookup() {
        assert_eq!(tiered(&[94.0]).tier(), Some(Tier::Warn));
        assert_eq!(tiered(&[96.0]).tier(), Some(Tier::Success));
        assert_eq!(tiered(&[10.0]).tier(), None);
    }

    #[test]
    fn tiers_win_over_target() {
        let rule = Rule::new(RuleConfig {
            requirements: reqs(&[60.0]),
            target:       Some(50.0),
            tiers:        Some(vec![TierEntry::new(55.0, Tier::Warn)]),
            ..Default::default()
        });
        assert_eq!(rule.tier(), Some(Tier::Warn));
    }

    fn closest_upper(tiers: &[TierEntry], value: f64) -> Option<Tier> {
        tiers
            .iter()
            .filter(|e| e.threshold >= value)
            .min_by(|a, b| a.threshold.total_cmp(&b.threshold))
            .map(|e| e.tier)
    }

    #[test]
    fn custom_matcher_replaces_lookup() {
        let rule = tiered(&[60.0]).with_matcher(closest_upper);
        assert_eq!(rule.tier(), Some(Tier::Success));
    }

    #[test]
    fn closure_matcher() {
        let rule = tiered(&[60.0]).with_matcher(|_: &[TierEntry], value: f64| {
            (value > 0.0).then_some(Tier::Warn)
        });
        assert_eq!(rule.tier(), Some(Tier::Warn));
    }

    #[test]
    fn matcher_on_simple_rule_keeps_target() {
        let rule = Rule::new(RuleConfig { requirements: reqs(&[90.0]), ..Default::default() })
            .with_matcher(closest_upper);
        // 95 is the only threshold and sits above 90
        assert_eq!(rule.tier(), Some(Tier::Success));
    }

    #[test]
    fn parses_from_toml_keeping_unknown_keys() {
        let raw = r#"
            name        = "Keep Regen rolling"
            description = "Regen should never drop"
            target      = 90
            owner       = "healers"

            [[requirements]]
            name    = "Regen uptime"
            percent = 92.5
        "#;
        let cfg: RuleConfig = toml::from_str(raw).expect("should parse");
        assert_eq!(cfg.target, Some(90.0));
        assert_eq!(cfg.extra.get("owner").and_then(|v| v.as_str()), Some("healers"));

        let rule = Rule::new(cfg);
        assert_eq!(rule.name, "Keep Regen rolling");
        assert_eq!(rule.tier(), Some(Tier::Success));
        assert!(rule.extra.contains_key("owner"));
    }

    #[test]
    fn parses_tier_table_from_toml() {
        let raw = r#"
            name  = "Tiered"
            tiers = [
                { threshold = 95, tier = "success" },
                { threshold = 50, tier = "warn" },
            ]
            requirements = [{ name = "a", percent = 60 }]
        "#;
        let rule = Rule::new(toml::from_str::<RuleConfig>(raw).expect("should parse"));
        assert_eq!(rule.tier(), Some(Tier::Warn));
    }

    #[test]
    fn result_snapshot() {
        let r = tiered(&[100.0, 80.0, 60.0]).result();
        assert_eq!(r.name,    "Tiered");
        assert_eq!(r.percent, 80.0);
        assert_eq!(r.tier,    Some(Tier::Warn));
    }
}
