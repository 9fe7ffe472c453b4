//! # Subscriptions
//!
//! A [`Subscription`] is the client end of a long-lived exchange. It yields
//! zero or more response events and at most one cancel event.
//!
//! ## State Machine
//!
//! ```text
//! Pending ──first response──→ Active ──respond(subscribed:false)──→ Cancelled
//!    │                          │  ──client cancel / drop──────────→
//!    └──────────────────────────┴──service cancel()────────────────→
//! ```
//!
//! `Cancelled` is terminal: later responses are dropped and repeated
//! cancels are no-ops. A client cancel or an auto-cancel also notifies the
//! method's cancel handler; a service-initiated cancel does not.

use crate::bus::LunaBus;
use crate::message::Message;
use crate::service::MethodChannel;
use parking_lot::Mutex;
use serde_json::Value;
use shared_types::{Payload, Response};
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The subscription has been cancelled and fully drained.
    #[error("subscription closed")]
    Closed,
}

/// Lifecycle of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Created; the request has not been answered yet.
    Pending,
    /// At least one response delivered.
    Active,
    /// Terminal.
    Cancelled,
}

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// A response from the service.
    Response(Payload),
    /// The subscription ended.
    Cancel(Payload),
}

impl SubscriptionEvent {
    /// The event payload.
    pub fn payload(&self) -> &Payload {
        match self {
            SubscriptionEvent::Response(p) | SubscriptionEvent::Cancel(p) => p,
        }
    }

    /// Whether this is the terminal cancel event.
    pub fn is_cancel(&self) -> bool {
        matches!(self, SubscriptionEvent::Cancel(_))
    }
}

/// Who ended a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CancelOrigin {
    /// The subscriber cancelled or dropped its handle.
    Client,
    /// The handler called `Message::cancel`.
    Service,
    /// The handler responded with `subscribed: false`.
    AutoCancel,
}

/// Route back to the handling service's cancel handler.
pub(crate) struct CancelRoute {
    pub(crate) bus: Weak<LunaBus>,
    pub(crate) service: String,
    pub(crate) message: Message,
}

/// State shared by the service-side [`Message`] and the client handle.
pub(crate) struct SubscriptionLink {
    state: Mutex<SubscriptionState>,
    events: mpsc::UnboundedSender<SubscriptionEvent>,
    channel: Mutex<Option<MethodChannel>>,
    route: Mutex<Option<CancelRoute>>,
}

impl SubscriptionLink {
    pub(crate) fn new(events: mpsc::UnboundedSender<SubscriptionEvent>) -> Self {
        Self {
            state: Mutex::new(SubscriptionState::Pending),
            events,
            channel: Mutex::new(None),
            route: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        *self.state.lock()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state() == SubscriptionState::Cancelled
    }

    pub(crate) fn set_route(&self, route: CancelRoute) {
        *self.route.lock() = Some(route);
    }

    /// Count this subscription against the method it reached.
    pub(crate) fn attach(&self, channel: MethodChannel) {
        let state = self.state.lock();
        if *state == SubscriptionState::Cancelled {
            return;
        }
        channel.add_subscriber();
        *self.channel.lock() = Some(channel);
    }

    /// Deliver a response from the service.
    pub(crate) fn respond(&self, payload: Payload) {
        let mut state = self.state.lock();
        if *state == SubscriptionState::Cancelled {
            debug!("Subscription cancelled; response dropped");
            return;
        }

        if matches!(payload.get("subscribed"), Some(Value::Bool(false))) {
            *state = SubscriptionState::Cancelled;
            let _ = self.events.send(SubscriptionEvent::Cancel(payload));
            drop(state);
            self.finish(CancelOrigin::AutoCancel);
            return;
        }

        *state = SubscriptionState::Active;
        let _ = self.events.send(SubscriptionEvent::Response(payload));
    }

    /// Move to `Cancelled`, emitting the cancel event. Returns false if the
    /// subscription was already cancelled.
    pub(crate) fn cancel(&self, origin: CancelOrigin, payload: Payload) -> bool {
        let mut state = self.state.lock();
        if *state == SubscriptionState::Cancelled {
            return false;
        }
        *state = SubscriptionState::Cancelled;
        let _ = self.events.send(SubscriptionEvent::Cancel(payload));
        drop(state);
        self.finish(origin);
        true
    }

    fn finish(&self, origin: CancelOrigin) {
        if let Some(channel) = self.channel.lock().take() {
            channel.remove_subscriber();
        }

        // Taking the route also breaks the link -> message -> link cycle.
        let Some(route) = self.route.lock().take() else {
            return;
        };
        if origin == CancelOrigin::Service {
            return;
        }
        if let Some(bus) = route.bus.upgrade() {
            bus.schedule_cancel(route.service, route.message);
        }
    }
}

/// Client handle for a subscription.
///
/// Dropping the handle cancels the subscription.
pub struct Subscription {
    link: std::sync::Arc<SubscriptionLink>,
    events: mpsc::UnboundedReceiver<SubscriptionEvent>,
    uri: String,
}

impl Subscription {
    pub(crate) fn new(
        link: std::sync::Arc<SubscriptionLink>,
        events: mpsc::UnboundedReceiver<SubscriptionEvent>,
        uri: String,
    ) -> Self {
        Self { link, events, uri }
    }

    /// Address this subscription was opened against.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        self.link.state()
    }

    /// Receive the next event.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next response or the cancel event
    /// - `None` - The subscription is cancelled and every event was consumed
    pub async fn recv(&mut self) -> Option<SubscriptionEvent> {
        if self.link.is_cancelled() {
            // The cancel event is queued before the state flips.
            return self.events.try_recv().ok();
        }
        self.events.recv().await
    }

    /// Receive without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))` - An event was available
    /// - `Ok(None)` - Nothing available yet
    /// - `Err(SubscriptionError::Closed)` - Cancelled and drained
    pub fn try_recv(&mut self) -> Result<Option<SubscriptionEvent>, SubscriptionError> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(_) if self.link.is_cancelled() => Err(SubscriptionError::Closed),
            Err(_) => Ok(None),
        }
    }

    /// Cancel from the client side.
    ///
    /// Emits one cancel event with `{returnValue: true, subscribed: false}`
    /// and schedules the service's cancel handler. No-op once cancelled.
    pub fn cancel(&self) {
        let payload = Response::ok().with("subscribed", false).into_payload();
        if self.link.cancel(CancelOrigin::Client, payload) {
            debug!(uri = %self.uri, "Subscription cancelled by client");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("uri", &self.uri)
            .field("state", &self.state())
            .finish()
    }
}

impl Stream for Subscription {
    type Item = SubscriptionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.link.is_cancelled() {
            return Poll::Ready(self.events.try_recv().ok());
        }
        self.events.poll_recv(cx)
    }
}
