use color_eyre::Result;
use std::{fs::create_dir_all, path::PathBuf};
use tracing_appender::rolling;
#[cfg(feature = "bunyan")]
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const APP_NAME: &str = "tg-video-relay";
const LOG_FILE: &str = "tg-video-relay.log";

/// Console output plus a log file in `.logs/`. Level comes from `RUST_LOG`
/// (default `info`).
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already set.
pub fn setup_logger() -> Result<()> {
    let log_dir_path = PathBuf::from(".logs");
    create_dir_all(&log_dir_path)?;

    let logfile = if cfg!(debug_assertions) {
        rolling::daily(log_dir_path, LOG_FILE)
    } else {
        rolling::never(log_dir_path, LOG_FILE)
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false));

    #[cfg(feature = "bunyan")]
    registry
        .with(JsonStorageLayer)
        .with(BunyanFormattingLayer::new(APP_NAME.into(), logfile))
        .try_init()?;

    #[cfg(not(feature = "bunyan"))]
    registry
        .with(fmt::layer().with_ansi(false).with_writer(logfile))
        .try_init()?;

    tracing::debug!(app = APP_NAME, "logger initialized");
    Ok(())
}
