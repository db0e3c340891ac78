use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_PREFIX: &str = "disk-janitor";
const RETAINED_LOG_FILES: usize = 7;

pub fn init_logger(log_level: &str, log_dir: &Path) -> Result<WorkerGuard> {
    // `TRACING_LEVEL` wins over the configured level.
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| level_directive(log_level).to_string());
    let filter_layer =
        EnvFilter::try_new(&filter).with_context(|| format!("Invalid log filter '{}'", filter))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(RETAINED_LOG_FILES)
        .build(log_dir)
        .with_context(|| format!("Failed to open log directory {}", log_dir.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(filter_layer)
        .init();

    info!("Tracing is configured for stdout and file logging.");

    Ok(guard)
}

/// Map conventional level names (as found in existing config files) onto
/// tracing directives.
fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}
