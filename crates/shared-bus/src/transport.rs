//! Transport abstraction.
//!
//! Client code talks to a [`BusTransport`] so it can run against the
//! in-process [`LunaBus`] or any other implementation of the protocol.

use crate::bus::LunaBus;
use crate::message::PendingCall;
use crate::subscription::Subscription;
use async_trait::async_trait;
use serde_json::Value;
use shared_types::{return_value, Payload};

/// Calls and subscriptions addressed by `luna://service/method`.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Issue a call on behalf of `sender` (empty for anonymous clients).
    fn call_from(&self, sender: &str, uri: &str, args: Value) -> PendingCall;

    /// Open a subscription on behalf of `sender`.
    fn subscribe_from(&self, sender: &str, uri: &str, args: Value) -> Subscription;

    /// Call and split the result on `returnValue`.
    ///
    /// # Returns
    ///
    /// - `Ok(payload)` - The handler responded with `returnValue: true`
    /// - `Err(payload)` - Anything else, payload unchanged
    async fn call_async(&self, sender: &str, uri: &str, args: Value) -> Result<Payload, Payload> {
        let payload = self.call_from(sender, uri, args).await;
        if return_value(&payload) {
            Ok(payload)
        } else {
            Err(payload)
        }
    }
}

#[async_trait]
impl BusTransport for LunaBus {
    fn call_from(&self, sender: &str, uri: &str, args: Value) -> PendingCall {
        LunaBus::call_from(self, sender, uri, args)
    }

    fn subscribe_from(&self, sender: &str, uri: &str, args: Value) -> Subscription {
        LunaBus::subscribe_from(self, sender, uri, args)
    }
}
