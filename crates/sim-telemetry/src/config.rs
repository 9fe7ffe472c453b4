//! Telemetry configuration from environment variables.

use shared_types::env_flag;
use std::env;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to the start-up log line
    pub service_name: String,

    /// Filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` expression such as `shared_bus=debug,info`)
    pub log_level: String,

    /// Whether to write logs to stdout at all
    pub console_output: bool,

    /// Whether to emit JSON lines instead of human-readable text
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "luna-sim".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LUNA_SERVICE_NAME`: Service name (default: luna-sim)
    /// - `LUNA_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `LUNA_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `LUNA_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: env::var("LUNA_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: env::var("LUNA_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            console_output: env_flag("LUNA_CONSOLE_OUTPUT").unwrap_or(defaults.console_output),

            json_logs: env_flag("LUNA_JSON_LOGS").unwrap_or(defaults.json_logs),
        }
    }

    /// Same configuration with a different filter.
    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.log_level = level.to_string();
        self
    }
}
