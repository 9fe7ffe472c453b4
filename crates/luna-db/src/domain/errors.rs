//! # Domain Errors
//!
//! Every store error maps onto a fixed wire code. The texts below are part
//! of the protocol that clients match on; keep them byte-for-byte.

use shared_types::{codes, Response};
use thiserror::Error;

/// Errors from document store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DbError {
    /// A `put` object has no usable `_kind`, or is not an object.
    #[error("db: kind not specified")]
    KindNotSpecified,

    /// A `merge` object has no `_id`.
    #[error("db: kind not specified (nor is _id!)")]
    MergeMissingId,

    /// A `merge` object names an `_id` the store does not hold.
    #[error("db: kind not specified (an _id was given that doesnt match anything)")]
    MergeUnknownId,

    /// A required request property is absent.
    #[error("required prop not found: {0}")]
    RequiredProp(&'static str),

    /// A `page` id that was never issued.
    #[error("page not found: {0}")]
    PageNotFound(String),

    /// `merge` called with none of `objects`, `query`, `props`.
    #[error("db: either objects or query param required for merge")]
    MergeParamsMissing,

    /// `merge` with `props` but no `query`.
    #[error("invalid parameters: required prop not found - 'query' for property 'props''")]
    MergePropsWithoutQuery,

    /// Request parameters of the wrong shape.
    #[error("invalid parameters: caller='{caller}' error='{detail}'")]
    InvalidParams { caller: String, detail: String },

    /// A batch operation without `method` or `params`.
    #[error("db: malformed batch operation at index {index}")]
    BatchMalformedOperation { index: usize },

    /// A batch operation naming a method batches cannot run.
    #[error("db: invalid batch method '{method}'")]
    BatchInvalidMethod { method: String },

    /// Snapshot file could not be read, parsed or written.
    #[error("db: snapshot '{path}' failed: {reason}")]
    Snapshot { path: String, reason: String },
}

impl DbError {
    /// Wire error code.
    pub fn code(&self) -> i64 {
        match self {
            DbError::KindNotSpecified | DbError::MergeMissingId | DbError::MergeUnknownId => {
                codes::KIND_NOT_SPECIFIED
            }
            DbError::RequiredProp(_) | DbError::PageNotFound(_) => codes::REQUIRED_PROP_MISSING,
            DbError::MergeParamsMissing
            | DbError::MergePropsWithoutQuery
            | DbError::InvalidParams { .. } => codes::INVALID_PARAMS,
            DbError::BatchMalformedOperation { .. } => codes::BATCH_MALFORMED_OPERATION,
            DbError::BatchInvalidMethod { .. } => codes::BATCH_INVALID_METHOD,
            DbError::Snapshot { .. } => codes::GENERIC,
        }
    }

    /// Wire error text.
    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl From<DbError> for Response {
    fn from(err: DbError) -> Self {
        Response::error(err.code(), err.text())
    }
}
