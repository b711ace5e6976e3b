//! Tracing subscriber setup for hosts.
//!
//! Output layers skip events emitted while a value access is capturing
//! diagnostics; those are recorded on the access outcome instead (and replayed
//! when the caller asked for it).

use crate::binding::diagnostics::{should_surface, DiagnosticCapture};
use crate::config::LoggingConfig;
use crate::error::{InspectError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Prefix of the daily rolling log files
pub const LOG_FILE_PREFIX: &str = "inspector.log";

/// Install the global subscriber. `RUST_LOG` overrides the configured filter.
/// Keep the returned guard alive for as long as file logging should flush.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| {
            InspectError::Config(format!("Invalid log filter '{}': {}", config.filter, e))
        })?;

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter_fn(should_surface));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_filter(filter_fn(should_surface)))
        .with(file_layer)
        .with(DiagnosticCapture)
        .try_init()
        .map_err(|e| InspectError::Config(format!("Failed to install logging: {}", e)))?;

    tracing::debug!("Logging initialized with filter '{}'", config.filter);
    Ok(guard)
}
