//! # Response Contract
//!
//! Handlers answer a request with a [`Response`]. On the wire every response
//! is a payload carrying a boolean `returnValue`; failures with a cause also
//! carry an `{errorCode, errorText}` pair.
//!
//! ## Legacy Payloads
//!
//! Older services hand the bus a bare object and expect `returnValue` to be
//! inferred from the presence of `errorCode`/`errorText`.
//! [`Response::from_legacy`] performs that inference. A half-specified error
//! pair is completed with a placeholder and logged as a bug in the calling
//! service.

use crate::codes;
use crate::payload::Payload;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Errors raised when a handler produces a response the bus cannot carry.
///
/// These are programming errors in the responding service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseShapeError {
    /// The response was not a JSON object.
    #[error("response must be an object ({origin})")]
    NotAnObject { origin: String },

    /// `returnValue` was present but not a boolean.
    #[error("returnValue must be a boolean ({origin})")]
    InvalidReturnValue { origin: String },
}

/// A response built by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// `returnValue: true` plus the payload fields.
    Success(Payload),

    /// `returnValue: false` without a structured cause.
    Failure(Payload),

    /// `returnValue: false` with `errorCode`/`errorText`, plus extra fields.
    Error {
        code: i64,
        text: String,
        extra: Payload,
    },
}

impl Response {
    /// Empty success: `{returnValue: true}`.
    pub fn ok() -> Self {
        Response::Success(Payload::new())
    }

    /// Success carrying the fields of `value` (which should be an object).
    pub fn success(value: Value) -> Self {
        Response::Success(crate::payload::payload_from(value))
    }

    /// Failure carrying the fields of `value`, without an error pair.
    pub fn failure(value: Value) -> Self {
        Response::Failure(crate::payload::payload_from(value))
    }

    /// Failure with an error pair.
    pub fn error(code: i64, text: impl Into<String>) -> Self {
        Response::Error {
            code,
            text: text.into(),
            extra: Payload::new(),
        }
    }

    /// Attach an additional field.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        let fields = match &mut self {
            Response::Success(p) | Response::Failure(p) => p,
            Response::Error { extra, .. } => extra,
        };
        fields.insert(key.to_string(), value.into());
        self
    }

    /// Whether this response reports success.
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    /// The error code, for [`Response::Error`].
    pub fn code(&self) -> Option<i64> {
        match self {
            Response::Error { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Serialize into the wire payload.
    pub fn into_payload(self) -> Payload {
        match self {
            Response::Success(mut p) => {
                p.insert("returnValue".into(), Value::Bool(true));
                p
            }
            Response::Failure(mut p) => {
                p.insert("returnValue".into(), Value::Bool(false));
                p
            }
            Response::Error {
                code,
                text,
                mut extra,
            } => {
                extra.insert("returnValue".into(), Value::Bool(false));
                extra.insert("errorCode".into(), Value::from(code));
                extra.insert("errorText".into(), Value::String(text));
                extra
            }
        }
    }

    /// Interpret a legacy response object.
    ///
    /// `origin` names the responding service and method for diagnostics.
    pub fn from_legacy(value: Value, origin: &str) -> Result<Self, ResponseShapeError> {
        let Value::Object(mut map) = value else {
            return Err(ResponseShapeError::NotAnObject {
                origin: origin.to_string(),
            });
        };

        match map.get("returnValue") {
            Some(Value::Bool(true)) => return Ok(Response::Success(map)),
            Some(Value::Bool(false)) => return Ok(Response::Failure(map)),
            Some(_) => {
                return Err(ResponseShapeError::InvalidReturnValue {
                    origin: origin.to_string(),
                })
            }
            None => {}
        }

        let has_code = map.get("errorCode").is_some_and(truthy);
        let has_text = map.get("errorText").is_some_and(truthy);
        if !has_code && !has_text {
            return Ok(Response::Success(map));
        }

        if !has_code {
            warn!(
                origin = origin,
                "Response set errorText without errorCode; defaulting errorCode to -1"
            );
            map.insert("errorCode".into(), Value::from(codes::GENERIC));
        }
        if !has_text {
            warn!(
                origin = origin,
                "Response set errorCode without errorText; using placeholder text"
            );
            map.insert("errorText".into(), Value::from(codes::NO_ERROR_TEXT));
        }

        let code = map.get("errorCode").and_then(Value::as_i64);
        let text = map.get("errorText").and_then(Value::as_str).map(str::to_string);
        match (code, text) {
            (Some(code), Some(text)) => {
                map.remove("errorCode");
                map.remove("errorText");
                Ok(Response::Error {
                    code,
                    text,
                    extra: map,
                })
            }
            // Non-numeric codes or non-string texts pass through untouched.
            _ => Ok(Response::Failure(map)),
        }
    }
}

impl From<Payload> for Response {
    /// A payload that already carries `returnValue: true` is a success;
    /// anything else is a failure. No inference is applied.
    fn from(payload: Payload) -> Self {
        if crate::payload::return_value(&payload) {
            Response::Success(payload)
        } else {
            Response::Failure(payload)
        }
    }
}

/// JavaScript-style truthiness, used only for legacy inference.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
