//! Bus configuration from environment variables.

pub use shared_types::flags::{env_flag, parse_flag};

/// Behavioral switches for the simulated bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Report calls to unknown services as errors instead of succeeding.
    pub strict_unknown_services: bool,

    /// Log every call, subscription and response at `info`.
    pub trace_calls: bool,

    /// Register built-in methods (`/quit`) with the first method of a service.
    pub builtin_methods: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            strict_unknown_services: false,
            trace_calls: false,
            builtin_methods: true,
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FAIL_UNKNOWN_LUNA_SERVICES`: strict unknown-service handling (default: off)
    /// - `DEBUG_LUNA_CALLS`: trace bus traffic (default: off)
    /// - `LUNA_NO_BUILTIN_METHODS`: suppress built-in methods (default: off)
    pub fn from_env() -> Self {
        Self {
            strict_unknown_services: env_flag("FAIL_UNKNOWN_LUNA_SERVICES").unwrap_or(false),
            trace_calls: env_flag("DEBUG_LUNA_CALLS").unwrap_or(false),
            builtin_methods: !env_flag("LUNA_NO_BUILTIN_METHODS").unwrap_or(false),
        }
    }

    /// Strict unknown-service handling.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict_unknown_services = true;
        self
    }

    /// Disable built-in methods.
    #[must_use]
    pub fn without_builtins(mut self) -> Self {
        self.builtin_methods = false;
        self
    }
}
