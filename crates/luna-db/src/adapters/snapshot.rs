//! JSON file snapshots.

use crate::domain::document::Document;
use crate::domain::errors::DbError;
use crate::ports::outbound::SnapshotIo;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Snapshots as a single JSON array per file.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileSnapshot;

fn snapshot_error(path: &Path, reason: impl ToString) -> DbError {
    DbError::Snapshot {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

impl SnapshotIo for JsonFileSnapshot {
    fn read(&self, path: &Path) -> Result<Vec<Document>, DbError> {
        let bytes = fs::read(path).map_err(|e| snapshot_error(path, e))?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| snapshot_error(path, e))?;
        let Value::Array(items) = value else {
            return Err(snapshot_error(path, "expected a JSON array"));
        };

        let docs = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                Document::from_value(item)
                    .ok_or_else(|| snapshot_error(path, format!("entry {i} is not an object")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(path = %path.display(), documents = docs.len(), "Snapshot read");
        Ok(docs)
    }

    fn write(&self, path: &Path, docs: &[Document]) -> Result<(), DbError> {
        let bytes = serde_json::to_vec(docs).map_err(|e| snapshot_error(path, e))?;
        fs::write(path, bytes).map_err(|e| snapshot_error(path, e))?;
        debug!(path = %path.display(), documents = docs.len(), "Snapshot written");
        Ok(())
    }
}
