//! Core data types shared across the sync pipeline.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Opaque, stable record identifier.
///
/// The target record carries the same identifier as its source record,
/// which is what makes upserts convergent: every writer that has seen the
/// same source state produces the same target record under the same key.
pub type RecordId = String;

/// Schemaless record body, as stored and as carried by change events.
///
/// Partial update deltas may address nested fields with dotted paths
/// (`address.line1`); full documents nest them as objects.
pub type Document = Map<String, Value>;

/// Field names of the customer document, as they appear on the wire.
pub mod fields {
    pub const FIRST_NAME: &str = "firstName";
    pub const LAST_NAME: &str = "lastName";
    pub const EMAIL: &str = "email";
    pub const ADDRESS: &str = "address";
    pub const LINE1: &str = "line1";
    pub const LINE2: &str = "line2";
    pub const POSTCODE: &str = "postcode";
    pub const CREATED_AT: &str = "createdAt";
}

/// A single notification from the source's change feed.
///
/// Consumed once and never persisted. Insert and replace carry the full
/// document; update carries only the changed fields. Everything else
/// (notably deletion) is `Other` and is rejected by the listener.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    Insert {
        id: RecordId,
        document: Document,
    },
    Update {
        id: RecordId,
        updated_fields: Document,
    },
    Replace {
        id: RecordId,
        document: Document,
    },
    Other {
        operation: String,
        id: Option<RecordId>,
    },
}

impl ChangeEvent {
    /// The operation type name, for logging.
    pub fn operation(&self) -> &str {
        match self {
            ChangeEvent::Insert { .. } => "insert",
            ChangeEvent::Update { .. } => "update",
            ChangeEvent::Replace { .. } => "replace",
            ChangeEvent::Other { operation, .. } => operation,
        }
    }
}

/// A record read back from a full scan of the source.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub id: RecordId,
    pub document: Document,
}

/// One idempotent write in a batch: filter on the identifier, set the
/// given fields, create the record if absent.
#[derive(Debug, Clone)]
pub struct UpsertOp {
    pub id: RecordId,
    pub fields: Document,
}

/// Outcome of a batched write.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkWriteOutcome {
    /// Records newly created by the batch.
    pub upserted: u64,
    /// Records that already existed and were updated in place.
    pub modified: u64,
}

/// A customer record as produced upstream.
///
/// Used by the synthetic producer and by test fixtures; the pipeline itself
/// only ever sees [`Document`]s.
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

/// Structured postal address.
#[derive(Debug, Clone)]
pub struct Address {
    pub line1: String,
    pub line2: String,
    pub postcode: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

impl Customer {
    /// The wire-shape document body for this customer (identifier excluded;
    /// it is carried separately as the record key).
    pub fn document(&self) -> Document {
        let mut address = Map::new();
        address.insert(fields::LINE1.to_string(), Value::String(self.address.line1.clone()));
        address.insert(fields::LINE2.to_string(), Value::String(self.address.line2.clone()));
        address.insert(fields::POSTCODE.to_string(), Value::String(self.address.postcode.clone()));
        address.insert("city".to_string(), Value::String(self.address.city.clone()));
        address.insert("state".to_string(), Value::String(self.address.state.clone()));
        address.insert("country".to_string(), Value::String(self.address.country.clone()));

        let mut doc = Map::new();
        doc.insert(fields::FIRST_NAME.to_string(), Value::String(self.first_name.clone()));
        doc.insert(fields::LAST_NAME.to_string(), Value::String(self.last_name.clone()));
        doc.insert(fields::EMAIL.to_string(), Value::String(self.email.clone()));
        doc.insert(fields::ADDRESS.to_string(), Value::Object(address));
        doc.insert(fields::CREATED_AT.to_string(), Value::String(self.created_at.to_rfc3339()));
        doc
    }
}
