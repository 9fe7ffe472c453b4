//! # Shared Bus - Simulated Luna Service Bus
//!
//! An in-process stand-in for the platform's inter-service bus. Services
//! register method handlers; clients call or subscribe to
//! `luna://service/method` addresses and receive responses exactly as they
//! would over the real bus.
//!
//! ## Dispatch Model
//!
//! ```text
//! ┌──────────────┐  call()/subscribe()   ┌───────────────┐
//! │   Caller     │ ────────────────────→ │  FIFO queue   │
//! │              │                       └───────┬───────┘
//! │ PendingCall  │                               │ dispatch task
//! │ Subscription │                               ▼
//! │      ↑       │                       ┌───────────────┐
//! └──────┼───────┘                       │ Service       │
//!        │        respond()/cancel()     │  /method ──→ handler(Message)
//!        └────────────────────────────── └───────────────┘
//! ```
//!
//! - Every delivery goes through one queue drained by one task, so nothing
//!   runs inside the caller's own frame and delivery order is issuance order.
//! - Handlers answer through the [`Message`] they receive. A plain call
//!   resolves its [`PendingCall`] once; a subscription streams any number of
//!   responses into its [`Subscription`] until cancelled.
//! - The registry is an explicit [`LunaBus`] value; there is no global state.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod service;
pub mod subscription;
pub mod transport;

// Re-export main types
pub use bus::LunaBus;
pub use config::BusConfig;
pub use dispatch::Dispatcher;
pub use error::BusError;
pub use message::{Message, PendingCall};
pub use service::{MethodChannel, MethodHandler, Service};
pub use subscription::{Subscription, SubscriptionError, SubscriptionEvent, SubscriptionState};
pub use transport::BusTransport;

/// Method registered on every service unless built-ins are disabled.
pub const QUIT_METHOD: &str = "/quit";
