//! # Bus Registry
//!
//! [`LunaBus`] maps service ids to [`Service`]s and owns the delivery queue.
//! It is an ordinary value: create one per test or per process and hand the
//! `Arc` to every service constructor.

use crate::config::BusConfig;
use crate::dispatch::{Delivery, Dispatcher};
use crate::message::{CallSlot, Message, PendingCall, ReplyPath};
use crate::service::Service;
use crate::subscription::{CancelRoute, Subscription, SubscriptionLink};
use parking_lot::RwLock;
use serde_json::Value;
use shared_types::{is_subscription_request, payload_from, BusUri, DEFAULT_CATEGORY};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The simulated bus.
pub struct LunaBus {
    me: Weak<LunaBus>,
    config: BusConfig,
    services: RwLock<HashMap<String, Arc<Service>>>,
    queue: mpsc::UnboundedSender<Delivery>,
    next_token: AtomicU64,
    deliveries: AtomicU64,
}

impl LunaBus {
    /// Create a bus and the dispatcher that drains its queue.
    ///
    /// Nothing is delivered until [`Dispatcher::run`] is polled.
    pub fn new(config: BusConfig) -> (Arc<Self>, Dispatcher) {
        let (queue, rx) = mpsc::unbounded_channel();
        let bus = Arc::new_cyclic(|me| LunaBus {
            me: me.clone(),
            config,
            services: RwLock::new(HashMap::new()),
            queue,
            next_token: AtomicU64::new(1),
            deliveries: AtomicU64::new(0),
        });
        let dispatcher = Dispatcher::new(Arc::downgrade(&bus), rx);
        (bus, dispatcher)
    }

    /// Create a bus and spawn its dispatcher on the current runtime.
    pub fn start(config: BusConfig) -> Arc<Self> {
        let (bus, dispatcher) = Self::new(config);
        tokio::spawn(dispatcher.run());
        info!(
            strict = bus.config.strict_unknown_services,
            builtins = bus.config.builtin_methods,
            "Luna bus started"
        );
        bus
    }

    /// Active configuration.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Register a service under `name`.
    ///
    /// An existing service with the same name is replaced.
    pub fn create_service(&self, name: &str) -> Arc<Service> {
        let service = Arc::new(Service::new(
            name,
            self.me.clone(),
            self.config.builtin_methods,
        ));
        if self
            .services
            .write()
            .insert(name.to_string(), service.clone())
            .is_some()
        {
            warn!(service = %name, "Service re-registered; previous instance replaced");
        } else {
            debug!(service = %name, "Service registered");
        }
        service
    }

    /// Remove a service. Returns whether it was registered.
    pub fn unregister_service(&self, name: &str) -> bool {
        let removed = self.services.write().remove(name).is_some();
        if removed {
            debug!(service = %name, "Service unregistered");
        }
        removed
    }

    /// Look up a service by id.
    pub fn service(&self, name: &str) -> Option<Arc<Service>> {
        self.services.read().get(name).cloned()
    }

    /// Registered service ids, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of deliveries the dispatcher has processed.
    pub fn deliveries(&self) -> u64 {
        self.deliveries.load(Ordering::SeqCst)
    }

    pub(crate) fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::SeqCst);
    }

    /// Call a method as an anonymous client.
    pub fn call(&self, uri: &str, args: Value) -> PendingCall {
        self.call_from("", uri, args)
    }

    /// Call a method on behalf of `sender`.
    ///
    /// The request is queued; the handler runs on a later turn of the
    /// dispatcher, never inside this call.
    pub fn call_from(&self, sender: &str, uri: &str, args: Value) -> PendingCall {
        let (tx, rx) = oneshot::channel();
        let (parsed, message) = self.message(sender, uri, args, ReplyPath::Call(CallSlot::new(tx)));
        let pending = PendingCall::new(rx, message.origin());
        self.trace("call", &message);
        self.schedule(Delivery::Request {
            uri: parsed,
            message,
        });
        pending
    }

    /// Subscribe as an anonymous client.
    pub fn subscribe(&self, uri: &str, args: Value) -> Subscription {
        self.subscribe_from("", uri, args)
    }

    /// Subscribe on behalf of `sender`. Returns immediately.
    pub fn subscribe_from(&self, sender: &str, uri: &str, args: Value) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let link = Arc::new(SubscriptionLink::new(tx));
        let (parsed, message) =
            self.message(sender, uri, args, ReplyPath::Subscription(link.clone()));

        link.set_route(CancelRoute {
            bus: self.me.clone(),
            service: message.target().to_string(),
            message: message.clone(),
        });

        self.trace("subscribe", &message);
        self.schedule(Delivery::Request {
            uri: parsed,
            message,
        });
        Subscription::new(link, rx, uri.to_string())
    }

    /// Queue delivery of `message` to the cancel handler of its method.
    pub(crate) fn schedule_cancel(&self, service: String, message: Message) {
        self.schedule(Delivery::Cancel { service, message });
    }

    pub(crate) fn schedule(&self, delivery: Delivery) {
        if let Err(err) = self.queue.send(delivery) {
            // Dropping the delivery drops its message, which resolves any
            // pending call with the dropped-message error.
            warn!(origin = %err.0.message().origin(), "Dispatcher stopped; delivery dropped");
        }
    }

    fn message(
        &self,
        sender: &str,
        uri: &str,
        args: Value,
        reply: ReplyPath,
    ) -> (Result<BusUri, shared_types::UriError>, Message) {
        let parsed = BusUri::parse(uri);
        let (target, method) = match &parsed {
            Ok(uri) => (uri.service.clone(), uri.method.clone()),
            Err(err) => (err.service_hint().to_string(), DEFAULT_CATEGORY.to_string()),
        };
        let payload = payload_from(args);
        let message = Message {
            is_subscription: is_subscription_request(&payload),
            payload,
            method,
            category: DEFAULT_CATEGORY.to_string(),
            unique_token: Uuid::new_v4().to_string(),
            token: self.next_token.fetch_add(1, Ordering::SeqCst),
            sender: sender.to_string(),
            target,
            reply,
        };
        (parsed, message)
    }

    fn trace(&self, kind: &str, message: &Message) {
        if self.config.trace_calls {
            info!(kind, sender = %message.sender, origin = %message.origin(), token = message.token, "Bus request");
        } else {
            debug!(kind, sender = %message.sender, origin = %message.origin(), token = message.token, "Bus request");
        }
    }
}

impl std::fmt::Debug for LunaBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LunaBus")
            .field("config", &self.config)
            .field("services", &self.service_names())
            .finish()
    }
}
