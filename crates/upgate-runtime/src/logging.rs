//! Tracing setup.

use tracing::{info_span, Span};
use tracing_subscriber::EnvFilter;
use upgate_core::{LogFields, LogFormat, LogsConfig};

use crate::error::{RuntimeError, RuntimeResult};

/// Install the global subscriber, writing to stderr.
///
/// `logs.level` accepts anything [`EnvFilter`] does, from a bare level
/// (`debug`) to per-target directives (`info,upgate_proxy=trace`).
pub fn init_tracing(logs: &LogsConfig) -> RuntimeResult<()> {
    let filter =
        EnvFilter::try_new(&logs.level).map_err(|e| RuntimeError::Logging(e.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match logs.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    result.map_err(|e| RuntimeError::Logging(e.to_string()))
}

/// Root span carrying the process-wide [`LogFields`].
pub fn root_span(fields: &LogFields) -> Span {
    info_span!(
        "upgate",
        app = %fields.app,
        region = %fields.region,
        version = %fields.version,
        stage = %fields.stage,
        commit = fields.commit.as_deref(),
    )
}
