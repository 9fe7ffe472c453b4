//! # Value Objects
//!
//! Configuration and small immutable values for the document store.

use serde::Serialize;
use shared_types::env_flag;
use std::env;

/// Largest page the store hands out, and the default when `limit` is absent.
pub const MAX_PAGE_SIZE: usize = 500;

/// Most ids one `reserveIds` request may ask for.
pub const MAX_RESERVE_IDS: usize = 500;

/// Configuration for a document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Page size when a query gives no `limit` (default: 500).
    pub default_limit: usize,

    /// Hard cap on `limit` (default: 500).
    pub max_limit: usize,

    /// Whether a `limit: 0` query with matches materializes pages and
    /// returns `next` pointing at the first one (default: false).
    pub page_on_zero_limit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_limit: MAX_PAGE_SIZE,
            max_limit: MAX_PAGE_SIZE,
            page_on_zero_limit: false,
        }
    }
}

impl StoreConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LUNA_DB_PAGE_ZERO_LIMIT`: page `limit: 0` queries (default: off)
    /// - `LUNA_DB_DEFAULT_LIMIT`: default page size, capped at the max (default: 500)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_limit = env::var("LUNA_DB_DEFAULT_LIMIT")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .map(|n| n.min(defaults.max_limit))
            .unwrap_or(defaults.default_limit);

        Self {
            default_limit,
            page_on_zero_limit: env_flag("LUNA_DB_PAGE_ZERO_LIMIT").unwrap_or(false),
            ..defaults
        }
    }

    /// Effective page size for a requested `limit`.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}

/// `{id, rev}` pair returned by every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteResult {
    pub id: String,
    pub rev: u64,
}

/// Kind of store mutation, reported to the watch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationEvent {
    Put,
    Merge,
    Del,
    Compact,
    Load,
}

impl MutationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationEvent::Put => "put",
            MutationEvent::Merge => "merge",
            MutationEvent::Del => "del",
            MutationEvent::Compact => "compact",
            MutationEvent::Load => "load",
        }
    }
}
