//! # Simulator Telemetry
//!
//! Structured logging for the simulator, built on `tracing-subscriber`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sim_telemetry::{init_logging, TelemetryConfig};
//!
//! init_logging(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LUNA_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `LUNA_JSON_LOGS` | `false` | JSON lines output |
//! | `LUNA_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `LUNA_SERVICE_NAME` | `luna-sim` | Name in the start-up line |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}
