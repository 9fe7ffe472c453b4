//! # Documents
//!
//! A document is a JSON object. Four fields are reserved:
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `_id` | Unique across the store, assigned on first insert |
//! | `_kind` | Collection discriminator, required on insert |
//! | `_rev` | Store-wide revision, reassigned on every write |
//! | `_del` | Soft-delete marker |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::Payload;
use uuid::Uuid;

pub const ID: &str = "_id";
pub const KIND: &str = "_kind";
pub const REV: &str = "_rev";
pub const DEL: &str = "_del";

/// Fresh opaque id for a document or page.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A stored document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Payload);

impl Document {
    pub fn new(fields: Payload) -> Self {
        Self(fields)
    }

    /// `Some` only for JSON objects.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get(ID).and_then(Value::as_str)
    }

    /// The kind, if it is a non-empty string.
    pub fn kind(&self) -> Option<&str> {
        self.0
            .get(KIND)
            .and_then(Value::as_str)
            .filter(|kind| !kind.is_empty())
    }

    pub fn rev(&self) -> Option<u64> {
        self.0.get(REV).and_then(Value::as_u64)
    }

    /// True only for `_del: true`.
    pub fn is_deleted(&self) -> bool {
        matches!(self.0.get(DEL), Some(Value::Bool(true)))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn fields(&self) -> &Payload {
        &self.0
    }

    /// Shallow-merge `fields` on top of this document.
    pub fn merge_from(&mut self, fields: &Payload) {
        for (key, value) in fields {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Copy of this document restricted to `select`. Absent fields stay absent.
    pub fn project(&self, select: &[String]) -> Document {
        let fields = select
            .iter()
            .filter_map(|field| self.0.get(field).map(|v| (field.clone(), v.clone())))
            .collect();
        Document(fields)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}
