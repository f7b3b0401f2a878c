// logging.rs - Console output always, JSON log files on request

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::settings::env_parse_bool;

static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const LOG_DIR: &str = "logs";

/// Filter directive: everything at `warn`, this crate and its binaries at `level`
fn filter_directive(level: &str) -> String {
    format!("warn,wallet_analyzer={level},fetch_feeds={level}")
}

fn env_filter(var: &str) -> EnvFilter {
    let level = env::var(var).unwrap_or_else(|_| "info".to_string());
    EnvFilter::try_new(filter_directive(&level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new(filter_directive("info")))
}

/// Install the global subscriber.
///
/// `CONSOLE_LOG_LEVEL` and `FILE_LOG_LEVEL` pick the levels (default `info`).
/// With `LOG_TO_FILE=true` a daily rotated JSON log is written under `logs/`.
pub fn init_logging() -> Result<()> {
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("CONSOLE_LOG_LEVEL"));

    if env_parse_bool("LOG_TO_FILE", false) {
        let log_dir = Path::new(LOG_DIR);
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

        let file_appender = tracing_appender::rolling::daily(log_dir, "wallet_analyzer.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        FILE_GUARD.set(guard).ok();

        let file_layer = fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_filter(env_filter("FILE_LOG_LEVEL"));

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
    }

    Ok(())
}
