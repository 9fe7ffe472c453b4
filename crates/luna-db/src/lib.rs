//! # Luna DB - Bus-Resident Document Database
//!
//! An in-memory stand-in for the platform database service. It answers the
//! same methods on the simulated bus, with the same payloads and error codes.
//!
//! ## Data Flow
//!
//! ```text
//! caller ──luna://db/put──→ handler ──→ DocumentStore (mutate)
//!                                            │
//!                                            ▼
//!                                       WatchEngine (re-run standing queries)
//!                                            │
//!                              fired / subscribed:false ──→ subscriber
//! ```
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Documents, queries, pages, the store and watches
//! - `ports/` - Outbound traits (watch delivery, snapshot storage)
//! - `adapters/` - JSON file snapshots
//! - `service/` - Bus method table and handlers
//!
//! ## Usage
//!
//! ```ignore
//! use luna_db::{DbService, StoreConfig};
//! use shared_bus::{BusConfig, LunaBus};
//!
//! let bus = LunaBus::start(BusConfig::from_env());
//! let db = DbService::start(&bus, "com.webos.service.db", StoreConfig::from_env())?;
//!
//! let put = bus.call("luna://com.webos.service.db/put", json!({
//!     "objects": [{ "_kind": "com.example:1", "name": "x" }]
//! })).await;
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use adapters::JsonFileSnapshot;
pub use domain::database::Database;
pub use domain::document::Document;
pub use domain::errors::DbError;
pub use domain::query::{Clause, Operator, Query};
pub use domain::store::{DocumentStore, QueryResult};
pub use domain::value_objects::{MutationEvent, StoreConfig, WriteResult, MAX_RESERVE_IDS};
pub use domain::watch::{Watch, WatchEngine, WatchMode};
pub use ports::outbound::{SnapshotIo, WatchChannel};
pub use service::{DbService, BATCH_METHODS, NOT_IMPLEMENTED};
