//! Process-wide tracing setup: console output plus an optional rolling file.

use pixhost_domain::config::LoggingConfig;
use std::borrow::Cow;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const MAX_LOG_FILES: usize = 10;
const LOG_FILE_SUFFIX: &str = "log";

#[pixhost_derive::pixhost_error]
pub enum TelemetryError {
    #[error("Rolling file appender error{}: {source}", format_context(.context))]
    Appender { source: tracing_appender::rolling::InitError, context: Option<Cow<'static, str>> },

    /// A global subscriber is already installed in this process.
    #[error("Tracing subscriber error{}: {source}", format_context(.context))]
    Subscriber { source: tracing_subscriber::util::TryInitError, context: Option<Cow<'static, str>> },

    #[error("Invalid logging configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Keeps the non-blocking file writer alive; drop it only at shutdown.
#[must_use = "Dropping this handle stops background log writing"]
#[derive(Debug)]
pub struct Telemetry {
    _guard: Option<WorkerGuard>,
}

/// Installs the global subscriber.
///
/// The filter defaults to `logging.level`; `RUST_LOG` overrides it. When
/// `logging.directory` is set, a daily-rotated file named after `name` is
/// written there as well (JSON when `logging.json`).
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidConfiguration`] for an unparsable level
/// or an uncreatable directory, and [`TelemetryError::Subscriber`] if a
/// subscriber was already installed.
pub fn init(name: &str, config: &LoggingConfig) -> Result<Telemetry, TelemetryError> {
    let env_filter = build_env_filter(&config.level)?;

    let mut layers = vec![layer().compact().with_ansi(true).boxed()];

    let guard = if let Some(directory) = &config.directory {
        std::fs::create_dir_all(directory).map_err(|e| TelemetryError::InvalidConfiguration {
            message: e.to_string().into(),
            context: Some(format!("Failed to create log directory {}", directory.display()).into()),
        })?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(name)
            .filename_suffix(LOG_FILE_SUFFIX)
            .max_log_files(MAX_LOG_FILES)
            .build(directory)?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let file_layer = layer().with_writer(writer).with_ansi(false);
        layers.push(if config.json { file_layer.json().boxed() } else { file_layer.boxed() });
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry().with(env_filter).with(layers).try_init()?;

    Ok(Telemetry { _guard: guard })
}

fn build_env_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    let directive = level.parse::<Directive>().map_err(|e| TelemetryError::InvalidConfiguration {
        message: format!("Invalid log level '{level}': {e}").into(),
        context: None,
    })?;
    Ok(EnvFilter::builder().with_default_directive(directive).from_env_lossy())
}
