//! # Adapters Module
//!
//! - `snapshot`: JSON file snapshots on the local filesystem

pub mod snapshot;

pub use snapshot::JsonFileSnapshot;
