//! Telemetry bootstrap
//!
//! Structured logging via tracing-subscriber. Consumers embedding the
//! engine in a larger service can skip this and install their own
//! subscriber instead.

use crate::error::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name included in log lines
    pub service_name: String,
    /// Log level filter (overridden by RUST_LOG when set)
    pub log_level: String,
    /// Whether log output includes span targets
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "mooring".to_string(),
            log_level: "info".to_string(),
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create a new configuration with the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Create from environment variables
    ///
    /// Reads `MOORING_SERVICE_NAME` (default: "mooring") and
    /// `RUST_LOG` (default: "info").
    pub fn from_env() -> Self {
        let service_name =
            std::env::var("MOORING_SERVICE_NAME").unwrap_or_else(|_| "mooring".to_string());
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            service_name,
            log_level,
            with_target: true,
        }
    }
}

/// Install a global tracing subscriber
///
/// # Errors
/// Returns error if a global subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init()
        .map_err(|e| Error::internal(format!("failed to install subscriber: {}", e)))?;

    tracing::info!(service = %config.service_name, "telemetry initialized");
    Ok(())
}
