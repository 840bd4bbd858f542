/// Analysis configuration, persisted as TOML (`config.toml`) in a config directory.
///
/// Every section is optional; missing keys fall back to the defaults below.
///
///   [pulse]
///   direct_ms = 20
///   status_ms = 200
///
///   [extensions]
///   single_target_ability_id = 3490
///   area_ability_id          = 16553
///   ignored_status_ids       = [1882]
///
///   [[checklist]]
///   name   = "Keep Regen rolling"
///   target = 90
use crate::{aoe::PulseThresholds, extensions::ExtensionSettings, rules::RuleConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Gap thresholds for pulse detection.
    #[serde(default)]
    pub pulse: PulseThresholds,

    /// Buff extension abilities to track. Untracked unless ids are set.
    #[serde(default)]
    pub extensions: ExtensionSettings,

    /// Extra checklist rules scored alongside the built-in ones.
    #[serde(default)]
    pub checklist: Vec<RuleConfig>,
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

pub fn load_or_default(config_dir: &Path) -> Result<AnalysisConfig> {
    let path = config_dir.join(CONFIG_FILE);
    if path.exists() {
        let raw = std::fs::read_to_string(&path)?;
        let cfg: AnalysisConfig = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Config parse error: {}", e))?;
        tracing::debug!("Config loaded from {:?}", path);
        Ok(cfg)
    } else {
        tracing::info!("No config at {:?}; using defaults", path);
        Ok(AnalysisConfig::default())
    }
}

pub fn save(config: &AnalysisConfig, config_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(config_dir)?;
    let raw = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("Config serialize error: {}", e))?;
    std::fs::write(config_dir.join(CONFIG_FILE), raw)?;
    Ok(())
}
