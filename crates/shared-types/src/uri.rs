//! # Bus Addresses
//!
//! Methods are addressed as `scheme://serviceId/methodPath`. The `luna` and
//! `palm` schemes name the same bus.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Schemes accepted for bus addresses.
pub const SCHEMES: [&str; 2] = ["luna", "palm"];

/// The only category the simulator knows about.
pub const DEFAULT_CATEGORY: &str = "/";

/// Errors from parsing a bus address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UriError {
    /// The scheme is neither `luna` nor `palm`.
    #[error("unsupported scheme '{scheme}' in {uri}")]
    UnsupportedScheme {
        scheme: String,
        service: String,
        uri: String,
    },

    /// No service id between the scheme and the method path.
    #[error("missing service id in {uri}")]
    MissingService { uri: String },
}

impl UriError {
    /// Best-effort service id, used when reporting the address as unknown.
    pub fn service_hint(&self) -> &str {
        match self {
            UriError::UnsupportedScheme { service, .. } => service,
            UriError::MissingService { .. } => "",
        }
    }
}

/// A parsed bus address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BusUri {
    /// Target service id (the URI host).
    pub service: String,
    /// Method path, always starting with `/`.
    pub method: String,
}

impl BusUri {
    /// Build an address from parts, normalizing the method path.
    pub fn new(service: impl Into<String>, method: &str) -> Self {
        Self {
            service: service.into(),
            method: normalize_method(method),
        }
    }

    /// Parse `scheme://service/method`.
    ///
    /// A string without a scheme is read as `service/method`.
    pub fn parse(uri: &str) -> Result<Self, UriError> {
        let (scheme, rest) = match uri.split_once("://") {
            Some((scheme, rest)) => (Some(scheme), rest),
            None => (None, uri),
        };

        let (service, method) = match rest.split_once('/') {
            Some((service, method)) => (service, method),
            None => (rest, ""),
        };

        if let Some(scheme) = scheme {
            if !SCHEMES.contains(&scheme) {
                return Err(UriError::UnsupportedScheme {
                    scheme: scheme.to_string(),
                    service: service.to_string(),
                    uri: uri.to_string(),
                });
            }
        }

        if service.is_empty() {
            return Err(UriError::MissingService {
                uri: uri.to_string(),
            });
        }

        Ok(Self::new(service, method))
    }
}

impl FromStr for BusUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BusUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "luna://{}{}", self.service, self.method)
    }
}

/// Ensure a method path starts with `/`.
pub fn normalize_method(method: &str) -> String {
    if method.starts_with('/') {
        method.to_string()
    } else {
        format!("/{method}")
    }
}
