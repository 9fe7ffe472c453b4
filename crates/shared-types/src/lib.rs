//! # Shared Types Crate
//!
//! Wire-level vocabulary shared by the simulated bus and every service that
//! lives on it.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: payload shape, the response contract and the
//!   protocol error codes are defined once, here.
//! - **Explicit Responses**: handlers build a [`Response`]; the transport only
//!   serializes it. Legacy `returnValue` inference is confined to
//!   [`Response::from_legacy`].
//! - **Codes Are Contract**: the numeric values in [`codes`] are observed by
//!   existing clients and must never change.

pub mod codes;
pub mod flags;
pub mod payload;
pub mod response;
pub mod uri;

pub use flags::{env_flag, parse_flag};
pub use payload::{is_subscription_request, payload_from, return_value, Payload};
pub use response::{Response, ResponseShapeError};
pub use uri::{normalize_method, BusUri, UriError, DEFAULT_CATEGORY, SCHEMES};
