//! # Watch Engine
//!
//! Standing queries re-run after every store mutation.
//!
//! ## State Machine
//!
//! ```text
//! one-shot:   Armed ──results non-empty──→ Fired (removed)
//! streaming:  Armed ──results differ from snapshot──→ Notifying ──→ Cancelled (removed)
//!               └──subscription cancelled──→ Cancelled (removed)
//! ```
//!
//! Watches are evaluated in registration order, synchronously with the
//! mutation that triggered them.

use super::document::Document;
use super::query::Query;
use super::store::DocumentStore;
use super::value_objects::MutationEvent;
use crate::ports::outbound::WatchChannel;
use tracing::{debug, warn};

/// How a watch reacts to a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Fire once the result set is non-empty.
    OneShot,
    /// Fire when the result set differs from the last delivered one,
    /// then end the subscription.
    Streaming,
}

/// A standing query and where to report it.
pub struct Watch {
    token: String,
    query: Query,
    mode: WatchMode,
    channel: Box<dyn WatchChannel>,
    snapshot: Vec<Document>,
}

impl Watch {
    /// A one-shot watch.
    pub fn one_shot(token: &str, query: Query, channel: Box<dyn WatchChannel>) -> Self {
        Self {
            token: token.to_string(),
            query,
            mode: WatchMode::OneShot,
            channel,
            snapshot: Vec::new(),
        }
    }

    /// A streaming watch; `snapshot` is the result set already delivered.
    pub fn streaming(
        token: &str,
        query: Query,
        channel: Box<dyn WatchChannel>,
        snapshot: Vec<Document>,
    ) -> Self {
        Self {
            token: token.to_string(),
            query,
            mode: WatchMode::Streaming,
            channel,
            snapshot,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    /// Re-run the query. Returns true when the watch is finished.
    fn check(&self, store: &DocumentStore) -> bool {
        let results = match store.evaluate(&self.query) {
            Ok(results) => results,
            Err(err) => {
                warn!(token = %self.token, error = %err, "Watch query failed; dropping watch");
                return true;
            }
        };

        match self.mode {
            WatchMode::OneShot => {
                if results.is_empty() {
                    return false;
                }
                self.channel.fire();
                true
            }
            WatchMode::Streaming => {
                if results == self.snapshot {
                    return false;
                }
                self.channel.fire();
                self.channel.terminate();
                true
            }
        }
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("token", &self.token)
            .field("mode", &self.mode)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Armed watches, in registration order.
#[derive(Debug, Default)]
pub struct WatchEngine {
    watches: Vec<Watch>,
}

impl WatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, watch: Watch) {
        debug!(token = %watch.token, mode = ?watch.mode, "Watch armed");
        self.watches.push(watch);
    }

    /// Remove the watch registered under `token`.
    pub fn remove(&mut self, token: &str) -> bool {
        let before = self.watches.len();
        self.watches.retain(|watch| watch.token != token);
        let removed = self.watches.len() != before;
        if removed {
            debug!(token, "Watch removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    /// Re-evaluate every armed watch. Returns how many fired.
    pub fn on_mutation(&mut self, store: &DocumentStore, event: MutationEvent) -> usize {
        if self.watches.is_empty() {
            return 0;
        }

        let mut fired = 0;
        let mut armed = Vec::with_capacity(self.watches.len());
        for watch in std::mem::take(&mut self.watches) {
            if watch.channel.is_closed() {
                debug!(token = %watch.token, "Watch channel closed; dropping watch");
                continue;
            }
            if watch.check(store) {
                fired += 1;
            } else {
                armed.push(watch);
            }
        }
        self.watches = armed;

        debug!(event = event.as_str(), fired, armed = self.watches.len(), "Watches evaluated");
        fired
    }
}
