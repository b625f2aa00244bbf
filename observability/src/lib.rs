//! # Logging helpers
//!
//! All dotlake binaries log through `tracing`. This crate installs the global
//! subscriber once at startup.

use error_stack::{Result, ResultExt};
use tracing::Subscriber;
use tracing_subscriber::{prelude::*, registry::LookupSpan, EnvFilter, Layer};

const RUST_LOG: &str = "RUST_LOG";
const RUST_LOG_FORMAT: &str = "RUST_LOG_FORMAT";

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

#[derive(Debug)]
pub struct ObservabilityError;
impl error_stack::Context for ObservabilityError {}

impl std::fmt::Display for ObservabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("failed to initialize logging")
    }
}

/// Output format of the log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, with ANSI colors.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Reads the format from `RUST_LOG_FORMAT`. Anything but `json` is pretty.
    pub fn from_env() -> Self {
        match std::env::var(RUST_LOG_FORMAT) {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// The filter is taken from `RUST_LOG` and defaults to `info`. It should be
/// called once during the application startup.
///
/// ```rs
/// use dotlake_observability::init_tracing;
///
/// init_tracing().unwrap();
/// ```
pub fn init_tracing() -> Result<(), ObservabilityError> {
    let layer = stderr(LogFormat::from_env(), env_filter());

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .change_context(ObservabilityError)
        .attach_printable("a global subscriber is already installed")?;

    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(RUST_LOG).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Logs go to stderr, stdout is reserved for command output.
fn stderr<S>(format: LogFormat, filter: EnvFilter) -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .compact()
            .with_filter(filter)
            .boxed(),
    }
}
