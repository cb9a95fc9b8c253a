//! Logging Infrastructure
//!
//! Console logging always; JSON format in production, human-readable
//! otherwise. When a log directory is configured, a daily-rotating file
//! layer is added alongside the console.

use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize console-only logging at the default level
pub fn init_logger() {
    init_logger_with_file(None, false, None).ok();
}

/// Initialize the logging system.
///
/// # Arguments
/// * `log_level` - fallback level when RUST_LOG is unset (default "info")
/// * `json_format` - JSON output (production) vs human-readable
/// * `log_dir` - optional directory for daily-rotating file output
pub fn init_logger_with_file(
    log_level: Option<&str>,
    json_format: bool,
    log_dir: Option<&str>,
) -> anyhow::Result<()> {
    let level = log_level.unwrap_or("info");
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match log_dir {
        Some(dir) => {
            let dir = Path::new(dir);
            fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "store-server");
            Some(fmt::layer().with_ansi(false).with_writer(appender))
        }
        None => None,
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(file_layer);

    if json_format {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(false))
            .init();
    }

    Ok(())
}
