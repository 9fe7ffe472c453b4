//! # Messages
//!
//! A [`Message`] is what a handler receives for one call or subscription.
//! It carries the request envelope and the two reply capabilities,
//! [`Message::respond`] and [`Message::cancel`].

use crate::subscription::{CancelOrigin, SubscriptionLink};
use parking_lot::Mutex;
use serde_json::Value;
use shared_types::{codes, Payload, Response, ResponseShapeError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::debug;

/// One request as seen by the handling service.
///
/// Cloning is cheap and every clone replies through the same path.
#[derive(Clone)]
pub struct Message {
    /// Request body.
    pub payload: Payload,
    /// Method path, starting with `/`.
    pub method: String,
    /// True when the payload asked for `subscribe` or `watch`.
    pub is_subscription: bool,
    /// Always `/`.
    pub category: String,
    /// Unique per message.
    pub unique_token: String,
    /// Bus-wide serial number, starting at 1.
    pub token: u64,
    /// Bus id of the calling service, or empty for anonymous clients.
    pub sender: String,
    /// Service id the message was addressed to.
    pub(crate) target: String,
    pub(crate) reply: ReplyPath,
}

/// Where responses to a message go.
#[derive(Clone)]
pub(crate) enum ReplyPath {
    Call(Arc<CallSlot>),
    Subscription(Arc<SubscriptionLink>),
}

/// Single-use response slot of a plain call.
pub(crate) struct CallSlot {
    sender: Mutex<Option<oneshot::Sender<Payload>>>,
}

impl CallSlot {
    pub(crate) fn new(sender: oneshot::Sender<Payload>) -> Arc<Self> {
        Arc::new(Self {
            sender: Mutex::new(Some(sender)),
        })
    }

    /// Resolve the call. Returns false if it was already resolved.
    fn resolve(&self, payload: Payload) -> bool {
        match self.sender.lock().take() {
            Some(sender) => {
                // The caller may have stopped waiting; that is not an error.
                let _ = sender.send(payload);
                true
            }
            None => false,
        }
    }
}

impl Message {
    /// `service/method`, for diagnostics.
    pub fn origin(&self) -> String {
        format!("{}{}", self.target, self.method)
    }

    /// Service id this message was addressed to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Send a response.
    ///
    /// For a plain call the first response resolves the caller and later ones
    /// are dropped. For a subscription every response is delivered in order;
    /// a payload with `subscribed: false` ends the subscription.
    pub fn respond(&self, response: Response) {
        let payload = response.into_payload();
        match &self.reply {
            ReplyPath::Call(slot) => {
                if !slot.resolve(payload) {
                    debug!(origin = %self.origin(), "Call already answered; response dropped");
                }
            }
            ReplyPath::Subscription(link) => link.respond(payload),
        }
    }

    /// Send a legacy response object, inferring `returnValue`.
    pub fn respond_json(&self, value: Value) -> Result<(), ResponseShapeError> {
        let response = Response::from_legacy(value, &self.origin())?;
        self.respond(response);
        Ok(())
    }

    /// Terminate the exchange from the service side.
    ///
    /// A subscription receives a single cancel event carrying `response`.
    /// A plain call is resolved with `response`.
    pub fn cancel(&self, response: Response) {
        let payload = response.into_payload();
        match &self.reply {
            ReplyPath::Call(slot) => {
                if !slot.resolve(payload) {
                    debug!(origin = %self.origin(), "Call already answered; cancel dropped");
                }
            }
            ReplyPath::Subscription(link) => {
                link.cancel(CancelOrigin::Service, payload);
            }
        }
    }

    /// Legacy form of [`Message::cancel`].
    pub fn cancel_json(&self, value: Value) -> Result<(), ResponseShapeError> {
        let response = Response::from_legacy(value, &self.origin())?;
        self.cancel(response);
        Ok(())
    }

    /// Whether the client side has gone away or the exchange has ended.
    pub fn is_closed(&self) -> bool {
        match &self.reply {
            ReplyPath::Call(slot) => slot.sender.lock().is_none(),
            ReplyPath::Subscription(link) => link.is_cancelled(),
        }
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("sender", &self.sender)
            .field("token", &self.token)
            .field("is_subscription", &self.is_subscription)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// The caller's side of a plain call.
///
/// Resolves with the response payload. If the handler drops every copy of
/// the message without answering, resolves with a generic error.
pub struct PendingCall {
    receiver: oneshot::Receiver<Payload>,
    origin: String,
}

impl PendingCall {
    pub(crate) fn new(receiver: oneshot::Receiver<Payload>, origin: String) -> Self {
        Self { receiver, origin }
    }

    /// A call that is already answered.
    #[cfg(test)]
    pub(crate) fn ready(payload: Payload, origin: String) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(payload);
        Self { receiver, origin }
    }
}

impl Future for PendingCall {
    type Output = Payload;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(payload)) => Poll::Ready(payload),
            Poll::Ready(Err(_)) => Poll::Ready(
                Response::error(
                    codes::GENERIC,
                    format!("Message dropped without response ({})", self.origin),
                )
                .into_payload(),
            ),
            Poll::Pending => Poll::Pending,
        }
    }
}
