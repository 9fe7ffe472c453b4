//! Errors from bus operations.

use shared_types::ResponseShapeError;
use thiserror::Error;

/// Errors returned to services using the bus API.
///
/// Protocol failures (unknown service, unknown method) are not errors here;
/// they travel back to the caller as response payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Method path is empty or contains whitespace.
    #[error("invalid method path '{path}'")]
    InvalidMethodPath { path: String },

    /// The bus this service belonged to has been dropped.
    #[error("bus has shut down")]
    BusClosed,

    /// A handler produced a response the bus cannot carry.
    #[error(transparent)]
    ResponseShape(#[from] ResponseShapeError),
}
