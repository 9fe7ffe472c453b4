//! # Domain Layer
//!
//! Pure document-store logic. Nothing here knows about the bus.
//!
//! ## Modules
//!
//! - `document` - Documents and their reserved fields
//! - `query` - Query model, clause matching and ordering
//! - `page` - Materialized result pages
//! - `store` - The document collection
//! - `watch` - Standing queries re-run on every mutation
//! - `database` - Store and watches combined
//! - `value_objects` - Configuration and write results
//! - `errors` - Domain error types

pub mod database;
pub mod document;
pub mod errors;
pub mod page;
pub mod query;
pub mod store;
pub mod value_objects;
pub mod watch;
