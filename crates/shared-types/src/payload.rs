//! # Payloads
//!
//! Every request and response body on the bus is a JSON object.

use serde_json::Value;
use tracing::warn;

/// A request or response body.
pub type Payload = serde_json::Map<String, Value>;

/// Convert an arbitrary JSON value into a payload.
///
/// `null` becomes the empty payload. Any other non-object value is not a
/// valid bus payload; it is logged and replaced with the empty payload.
pub fn payload_from(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        Value::Null => Payload::new(),
        other => {
            warn!(value = %other, "Bus payload must be an object; sending empty payload");
            Payload::new()
        }
    }
}

/// Read the `returnValue` flag of a response payload.
///
/// Anything other than a literal `true` counts as failure.
pub fn return_value(payload: &Payload) -> bool {
    matches!(payload.get("returnValue"), Some(Value::Bool(true)))
}

/// Whether a request payload asks for a long-lived subscription.
pub fn is_subscription_request(payload: &Payload) -> bool {
    let flag = |key: &str| matches!(payload.get(key), Some(Value::Bool(true)));
    flag("subscribe") || flag("watch")
}
