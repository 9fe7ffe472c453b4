//! # Dispatcher
//!
//! Drains the bus queue one delivery at a time. Handlers run on the
//! dispatcher task with no registry or table lock held, so they may call
//! back into the bus freely.

use crate::bus::LunaBus;
use crate::message::{Message, ReplyPath};
use crate::service::{MethodHandler, Service};
use serde_json::json;
use shared_types::{codes, BusUri, Response, UriError, DEFAULT_CATEGORY};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// One unit of work on the bus queue.
pub(crate) enum Delivery {
    /// Deliver a request to its handler.
    Request {
        uri: Result<BusUri, UriError>,
        message: Message,
    },
    /// Deliver a cancelled subscription's message to the cancel handler.
    Cancel { service: String, message: Message },
}

impl Delivery {
    pub(crate) fn message(&self) -> &Message {
        match self {
            Delivery::Request { message, .. } | Delivery::Cancel { message, .. } => message,
        }
    }
}

/// The single consumer of the bus queue.
pub struct Dispatcher {
    bus: Weak<LunaBus>,
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Dispatcher {
    pub(crate) fn new(bus: Weak<LunaBus>, rx: mpsc::UnboundedReceiver<Delivery>) -> Self {
        Self { bus, rx }
    }

    /// Process deliveries until the bus is dropped.
    pub async fn run(mut self) {
        while let Some(delivery) = self.rx.recv().await {
            let Some(bus) = self.bus.upgrade() else {
                break;
            };
            bus.record_delivery();
            match delivery {
                Delivery::Request { uri, message } => deliver_request(&bus, uri, message),
                Delivery::Cancel { service, message } => deliver_cancel(&bus, &service, message),
            }
        }
        debug!("Dispatcher stopped");
    }
}

fn deliver_request(bus: &LunaBus, uri: Result<BusUri, UriError>, message: Message) {
    let service = match &uri {
        Ok(uri) => bus.service(&uri.service),
        Err(err) => {
            debug!(error = %err, "Unparseable bus address");
            None
        }
    };
    let Some(service) = service else {
        unknown_service(bus, &message);
        return;
    };

    let Some((handler, channel)) = service.lookup(&message.method) else {
        unknown_method(bus, &message);
        return;
    };

    if let ReplyPath::Subscription(link) = &message.reply {
        link.attach(channel);
    }

    if bus.config().trace_calls {
        info!(origin = %message.origin(), token = message.token, "Delivering request");
    }

    match handler {
        MethodHandler::Callback {
            on_request: Some(on_request),
            ..
        } => {
            let reply = message.clone();
            if !run_handler(&reply, || on_request(message)) {
                let text = format!("Handler failed ({})", reply.origin());
                reject(&reply, Response::error(codes::GENERIC, text));
            }
        }
        MethodHandler::Callback {
            on_request: None, ..
        } => {
            debug!(origin = %message.origin(), "No request handler; message dropped");
        }
        MethodHandler::NotImplemented => {
            let text = format!("{} not implemented", message.method);
            message.respond(Response::failure(json!({ "message": text })));
        }
        MethodHandler::Quit => quit(bus, &service, &message),
    }
}

fn deliver_cancel(bus: &LunaBus, service: &str, message: Message) {
    let handler = bus
        .service(service)
        .and_then(|service| service.lookup(&message.method));
    match handler {
        Some((
            MethodHandler::Callback {
                on_cancel: Some(on_cancel),
                ..
            },
            _,
        )) => {
            if bus.config().trace_calls {
                info!(origin = %message.origin(), token = message.token, "Delivering cancel");
            }
            let origin = message.clone();
            run_handler(&origin, || on_cancel(message));
        }
        _ => debug!(origin = %message.origin(), "No cancel handler"),
    }
}

fn unknown_service(bus: &LunaBus, message: &Message) {
    if bus.config().strict_unknown_services {
        let response = Response::error(
            codes::GENERIC,
            format!("Service does not exist: {}.", message.target()),
        );
        debug!(service = %message.target(), "Unknown service");
        reject(message, response);
    } else {
        let mut response = Response::ok();
        if matches!(message.reply, ReplyPath::Subscription(_)) {
            response = response.with("subscribed", true);
        }
        debug!(service = %message.target(), "Unknown service; answering success");
        message.respond(response);
    }
}

/// Calls always fail. Subscriptions fail only in strict mode; in lenient
/// mode they get one `subscribed: true` response and stay silent.
fn unknown_method(bus: &LunaBus, message: &Message) {
    let is_subscription = matches!(message.reply, ReplyPath::Subscription(_));
    if is_subscription && !bus.config().strict_unknown_services {
        debug!(origin = %message.origin(), "Unknown method; answering subscription");
        message.respond(Response::ok().with("subscribed", true));
        return;
    }

    let response = Response::error(
        codes::GENERIC,
        format!(
            "Unknown method \"{}\" for category \"{}\"",
            message.method, DEFAULT_CATEGORY
        ),
    );
    debug!(origin = %message.origin(), "Unknown method");
    reject(message, response);
}

/// Run a handler, containing any panic to this one delivery.
///
/// Returns false if the handler panicked.
fn run_handler(message: &Message, handler: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(handler)) {
        Ok(()) => true,
        Err(_) => {
            error!(origin = %message.origin(), token = message.token, "Handler panicked");
            false
        }
    }
}

/// Fail a request. Subscriptions are ended with a single cancel event.
fn reject(message: &Message, response: Response) {
    match message.reply {
        ReplyPath::Subscription(_) => message.cancel(response.with("subscribed", false)),
        ReplyPath::Call(_) => message.respond(response),
    }
}

fn quit(bus: &LunaBus, service: &Arc<Service>, message: &Message) {
    message.respond(Response::success(json!({ "status": "quitting" })));
    bus.unregister_service(service.name());
    info!(service = %service.name(), "Service quit");
}
