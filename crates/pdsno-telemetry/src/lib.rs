//! # PDSNO Telemetry
//!
//! Structured logging and Prometheus metrics setup shared by every
//! controller process. Grounded on `quantum-telemetry`.

pub mod logging;
pub mod metrics;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Telemetry configuration consumed by `init`. Loading this from YAML/env is
/// out of scope (spec §1); the core only consumes the typed struct.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub json_logs: bool,
    pub env_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            env_filter: "info".to_string(),
        }
    }
}

/// Initialize the global tracing subscriber. Idempotent per-process: a
/// second call is a silent no-op, mirroring the teacher's tolerance for
/// being invoked once per binary and once per test module.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_new(&config.env_filter)
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    let builder = fmt().with_env_filter(filter);
    let result = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // `try_init` errors if a subscriber is already installed; that's fine in
    // tests where multiple modules call `init`.
    let _ = result;
    Ok(())
}
