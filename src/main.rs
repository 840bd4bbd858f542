//! Replays an encounter fixture through the analysis engine.
//!
//!   combat-ledger-replay <encounter.json> [config-dir]
//!
//! Reads `config.toml` from the config directory (default: current dir),
//! logs to `<config-dir>/logs/`, and prints one JSON line per fabricated
//! event followed by one per checklist result.
use anyhow::{Context, Result};
use combat_ledger_analysis::{
    config,
    engine::{self, Encounter},
    init_logging,
    roster::Roster,
};
use std::io::Write;
use std::path::PathBuf;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let fixture = args
        .next()
        .context("usage: combat-ledger-replay <encounter.json> [config-dir]")?;
    let config_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    let _guard = init_logging(&config_dir.join("logs"))?;
    let cfg = config::load_or_default(&config_dir)?;

    let raw = std::fs::read_to_string(&fixture)
        .with_context(|| format!("reading {}", fixture))?;
    let encounter: Encounter = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", fixture))?;
    tracing::info!(
        "Replaying {}: {} actors, {} events",
        fixture,
        encounter.actors.len(),
        encounter.events.len()
    );

    let analysis = engine::run(encounter.events, Roster::from_entities(encounter.actors), &cfg);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for aoe in analysis.aoe_events() {
        serde_json::to_writer(&mut out, aoe)?;
        writeln!(out)?;
    }
    for result in &analysis.checklist {
        serde_json::to_writer(&mut out, result)?;
        writeln!(out)?;
    }
    Ok(())
}
