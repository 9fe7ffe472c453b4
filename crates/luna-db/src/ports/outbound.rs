//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the store needs from the outside world.

use crate::domain::document::Document;
use crate::domain::errors::DbError;
use std::path::Path;

/// Delivery side of a standing watch.
///
/// The service layer implements this for bus messages; tests implement it
/// with plain channels.
pub trait WatchChannel: Send {
    /// Deliver `{returnValue: true, fired: true, subscribe: false}`.
    fn fire(&self);

    /// End the owning subscription with `{returnValue: true, subscribed: false}`.
    fn terminate(&self);

    /// Whether the other side has gone away. Closed watches are dropped.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Whole-store snapshot storage.
pub trait SnapshotIo: Send + Sync {
    /// Read a snapshot. The file must hold a JSON array of objects.
    fn read(&self, path: &Path) -> Result<Vec<Document>, DbError>;

    /// Write `docs` as a JSON array.
    fn write(&self, path: &Path, docs: &[Document]) -> Result<(), DbError>;
}
