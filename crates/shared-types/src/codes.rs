//! # Protocol Error Codes
//!
//! Numeric `errorCode` values reproduced from the real platform services.
//! Clients compare against these literally.

/// Generic failure: unknown service, unknown method, I/O problems.
pub const GENERIC: i64 = -1;

/// Malformed parameters (`invalid parameters: ...`).
pub const INVALID_PARAMS: i64 = 22;

/// A required property is missing from the request.
pub const REQUIRED_PROP_MISSING: i64 = -986;

/// `db: kind not specified` and the related merge validation failures.
pub const KIND_NOT_SPECIFIED: i64 = -3969;

/// A batch operation names a method outside the batchable set.
pub const BATCH_INVALID_METHOD: i64 = -3982;

/// A batch operation lacks `method` or `params`.
pub const BATCH_MALFORMED_OPERATION: i64 = -3984;

/// Placeholder text synthesized when a handler sets only `errorCode`.
pub const NO_ERROR_TEXT: &str = "no error message provided";
