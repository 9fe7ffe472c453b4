//! # Services
//!
//! A [`Service`] owns a method table: path → [`MethodHandler`]. Tables are
//! validated when a path is registered, so the dispatcher only ever looks
//! up a path and runs what it finds.

use crate::bus::LunaBus;
use crate::error::BusError;
use crate::message::{Message, PendingCall};
use crate::subscription::Subscription;
use crate::QUIT_METHOD;
use parking_lot::RwLock;
use serde_json::Value;
use shared_types::{normalize_method, return_value, Payload};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Request or cancel callback.
pub type HandlerFn = Arc<dyn Fn(Message) + Send + Sync>;

/// What runs when a method path is called.
#[derive(Clone)]
pub enum MethodHandler {
    /// User handlers. A `None` slot keeps whatever was registered before.
    Callback {
        on_request: Option<HandlerFn>,
        on_cancel: Option<HandlerFn>,
    },
    /// Responds `{returnValue: false, message: "<path> not implemented"}`.
    NotImplemented,
    /// Responds `{status: "quitting"}` and unregisters the service.
    Quit,
}

impl MethodHandler {
    /// Apply a re-registration on top of the current handler.
    fn replace_with(self, update: MethodHandler) -> MethodHandler {
        match (self, update) {
            (
                MethodHandler::Callback {
                    on_request,
                    on_cancel,
                },
                MethodHandler::Callback {
                    on_request: new_request,
                    on_cancel: new_cancel,
                },
            ) => MethodHandler::Callback {
                on_request: new_request.or(on_request),
                on_cancel: new_cancel.or(on_cancel),
            },
            (_, update) => update,
        }
    }
}

impl std::fmt::Debug for MethodHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodHandler::Callback {
                on_request,
                on_cancel,
            } => f
                .debug_struct("Callback")
                .field("on_request", &on_request.is_some())
                .field("on_cancel", &on_cancel.is_some())
                .finish(),
            MethodHandler::NotImplemented => f.write_str("NotImplemented"),
            MethodHandler::Quit => f.write_str("Quit"),
        }
    }
}

/// Per-path handle tracking live subscriptions.
#[derive(Debug, Clone)]
pub struct MethodChannel {
    path: String,
    subscribers: Arc<AtomicUsize>,
}

impl MethodChannel {
    pub(crate) fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Method path this channel belongs to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of subscriptions currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }

    pub(crate) fn add_subscriber(&self) {
        self.subscribers.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn remove_subscriber(&self) {
        let _ = self
            .subscribers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

struct MethodEntry {
    handler: MethodHandler,
    channel: MethodChannel,
}

/// A named participant on the bus.
pub struct Service {
    name: String,
    bus: Weak<LunaBus>,
    methods: RwLock<HashMap<String, MethodEntry>>,
    builtin_methods: bool,
}

impl Service {
    pub(crate) fn new(name: &str, bus: Weak<LunaBus>, builtin_methods: bool) -> Self {
        Self {
            name: name.to_string(),
            bus,
            methods: RwLock::new(HashMap::new()),
            builtin_methods,
        }
    }

    /// Bus id of this service.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a request handler.
    pub fn register<F>(&self, path: &str, on_request: F) -> Result<MethodChannel, BusError>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.register_handler(
            path,
            MethodHandler::Callback {
                on_request: Some(Arc::new(on_request)),
                on_cancel: None,
            },
        )
    }

    /// Register a request handler and a cancel handler.
    ///
    /// The cancel handler receives the original [`Message`] when a
    /// subscriber cancels or the subscription auto-cancels.
    pub fn register_with_cancel<F, C>(
        &self,
        path: &str,
        on_request: F,
        on_cancel: C,
    ) -> Result<MethodChannel, BusError>
    where
        F: Fn(Message) + Send + Sync + 'static,
        C: Fn(Message) + Send + Sync + 'static,
    {
        self.register_handler(
            path,
            MethodHandler::Callback {
                on_request: Some(Arc::new(on_request)),
                on_cancel: Some(Arc::new(on_cancel)),
            },
        )
    }

    /// Register a path that answers with a not-implemented failure.
    pub fn register_not_implemented(&self, path: &str) -> Result<MethodChannel, BusError> {
        self.register_handler(path, MethodHandler::NotImplemented)
    }

    /// Register a handler for `path`.
    ///
    /// Re-registering a path keeps its [`MethodChannel`] and subscriber
    /// count. The first registration on a service also installs the
    /// built-in methods unless they are disabled.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidMethodPath` for an empty path or one containing
    /// whitespace.
    pub fn register_handler(
        &self,
        path: &str,
        handler: MethodHandler,
    ) -> Result<MethodChannel, BusError> {
        if path.is_empty() || path.chars().any(char::is_whitespace) {
            return Err(BusError::InvalidMethodPath {
                path: path.to_string(),
            });
        }
        let path = normalize_method(path);

        let mut methods = self.methods.write();
        let first = methods.is_empty();

        let channel = match methods.remove(&path) {
            Some(entry) => {
                let channel = entry.channel.clone();
                methods.insert(
                    path.clone(),
                    MethodEntry {
                        handler: entry.handler.replace_with(handler),
                        channel: entry.channel,
                    },
                );
                channel
            }
            None => {
                let channel = MethodChannel::new(&path);
                methods.insert(
                    path.clone(),
                    MethodEntry {
                        handler,
                        channel: channel.clone(),
                    },
                );
                channel
            }
        };

        if first && self.builtin_methods && !methods.contains_key(QUIT_METHOD) {
            methods.insert(
                QUIT_METHOD.to_string(),
                MethodEntry {
                    handler: MethodHandler::Quit,
                    channel: MethodChannel::new(QUIT_METHOD),
                },
            );
        }

        debug!(service = %self.name, method = %path, "Method registered");
        Ok(channel)
    }

    /// Handler and channel registered for `path`.
    pub fn lookup(&self, path: &str) -> Option<(MethodHandler, MethodChannel)> {
        self.methods
            .read()
            .get(path)
            .map(|entry| (entry.handler.clone(), entry.channel.clone()))
    }

    /// Registered method paths, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.methods.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn bus(&self) -> Result<Arc<LunaBus>, BusError> {
        self.bus.upgrade().ok_or(BusError::BusClosed)
    }

    /// Call another method, with this service as sender.
    pub fn call(&self, uri: &str, args: Value) -> Result<PendingCall, BusError> {
        Ok(self.bus()?.call_from(&self.name, uri, args))
    }

    /// Call and split the response on `returnValue`.
    pub async fn call_async(&self, uri: &str, args: Value) -> Result<Result<Payload, Payload>, BusError> {
        let payload = self.call(uri, args)?.await;
        Ok(if return_value(&payload) {
            Ok(payload)
        } else {
            Err(payload)
        })
    }

    /// Subscribe to another method, with this service as sender.
    pub fn subscribe(&self, uri: &str, args: Value) -> Result<Subscription, BusError> {
        Ok(self.bus()?.subscribe_from(&self.name, uri, args))
    }

    /// Remove this service from the bus.
    pub fn quit(&self) -> Result<(), BusError> {
        let bus = self.bus()?;
        bus.unregister_service(&self.name);
        info!(service = %self.name, "Service quit");
        Ok(())
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("methods", &self.methods())
            .finish()
    }
}
