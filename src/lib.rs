pub mod aoe;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod extensions;
pub mod roster;
pub mod rules;

use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

/// Route `tracing` output to a daily rolling file under `log_dir`.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the background writer. Panics are logged through
/// tracing before the default hook runs.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "analysis.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("combat_ledger_analysis=debug".parse()?),
        )
        .with_writer(non_blocking)
        .with_ansi(false) // log files should not contain ANSI colour codes
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logging init error: {}", e))?;

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        tracing::error!("PANIC at {}: {}", location, message);
        default_hook(info);
    }));

    tracing::info!("Logging to {}", log_dir.display());
    Ok(guard)
}
