//! Logging initialization.
//!
//! One subscriber for the whole process, selected by [`LogFormat`]:
//! flattened JSON lines for log shippers, compact human output for a
//! terminal. Initialization is fallible so a double init (tests, embedded
//! use) surfaces as a `TelemetryError` instead of a panic.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directives when `RUST_LOG` is unset.
///
/// Informational everywhere, debug for the lifecycle crates, with the
/// chatty store internals (per-record put/dedup traces) held back at info.
const DEFAULT_DIRECTIVES: &str = "info,vigil_app=debug,vigil_pipeline=debug,\
    vigil_tracker=debug,vigil_scheduler=debug,vigil_governance=debug,\
    vigil_store=info";

/// Subscriber output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Flattened JSON lines, one event per line.
    Json,
    /// Compact single-line output for terminals.
    Compact,
}

impl LogFormat {
    /// Resolve the format from the environment.
    ///
    /// `VIGIL_LOG_FORMAT` (`json` / `compact`) wins; otherwise production
    /// deployments (`RUST_ENV=production`) get JSON and everything else
    /// gets compact output.
    pub fn from_env() -> Self {
        let explicit = std::env::var("VIGIL_LOG_FORMAT").ok();
        let production = std::env::var("RUST_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);
        Self::resolve(explicit.as_deref(), production)
    }

    fn resolve(explicit: Option<&str>, production: bool) -> Self {
        match explicit.map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some("compact") | Some("pretty") => Self::Compact,
            _ if production => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Initialize logging with the format resolved from the environment.
pub fn init_logging() -> TelemetryResult<()> {
    init_logging_with(LogFormat::from_env())
}

/// Initialize logging with an explicit format.
pub fn init_logging_with(format: LogFormat) -> TelemetryResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().flatten_event(true))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
