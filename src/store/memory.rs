//! In-memory store implementing the storage capability seams.
//!
//! One [`MemoryStore`] models one collection: a record map plus a
//! broadcast change feed fed by the mutating operations. The demo binary
//! and the integration tests run a source/target pair of these; a
//! production deployment implements the same traits over its driver.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

use crate::error::{Result, VeilError};
use crate::store::{ChangeFeed, RecordCursor, SourceStore, TargetStore};
use crate::types::{BulkWriteOutcome, ChangeEvent, Document, RecordId, SourceRecord, UpsertOp};

/// Events buffered per subscriber before a slow consumer starts lagging.
const FEED_CAPACITY: usize = 4096;

/// A single in-memory collection with a change feed.
pub struct MemoryStore {
    name: String,
    records: RwLock<BTreeMap<RecordId, Document>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            name: name.into(),
            records: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a new record, emitting an insert event with the full body.
    pub async fn insert(&self, id: RecordId, document: Document) {
        self.records.write().await.insert(id.clone(), document.clone());
        let _ = self.events.send(ChangeEvent::Insert { id, document });
    }

    /// Replace an existing record wholesale.
    pub async fn replace(&self, id: RecordId, document: Document) {
        self.records.write().await.insert(id.clone(), document.clone());
        let _ = self.events.send(ChangeEvent::Replace { id, document });
    }

    /// Apply a partial update, emitting only the changed fields. Dotted
    /// paths address nested objects.
    pub async fn update(&self, id: RecordId, updated_fields: Document) {
        {
            let mut records = self.records.write().await;
            if let Some(doc) = records.get_mut(&id) {
                for (path, value) in &updated_fields {
                    set_path(doc, path, value.clone());
                }
            }
        }
        let _ = self.events.send(ChangeEvent::Update { id, updated_fields });
    }

    /// Delete a record. The feed reports this as an unsupported operation,
    /// which the listener rejects: deletions are never propagated.
    pub async fn delete(&self, id: &str) {
        self.records.write().await.remove(id);
        let _ = self.events.send(ChangeEvent::Other {
            operation: "delete".to_string(),
            id: Some(id.to_string()),
        });
    }

    pub async fn get(&self, id: &str) -> Option<Document> {
        self.records.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Set a (possibly dotted) path within a document, creating intermediate
/// objects as needed.
fn set_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                set_path(inner, rest, value);
            }
        }
    }
}

struct MemoryFeed {
    collection: String,
    receiver: Option<broadcast::Receiver<ChangeEvent>>,
}

#[async_trait]
impl ChangeFeed for MemoryFeed {
    async fn next(&mut self) -> Result<Option<ChangeEvent>> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Ok(None);
        };
        match receiver.recv().await {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::RecvError::Closed) => Ok(None),
            Err(broadcast::error::RecvError::Lagged(missed)) => Err(VeilError::Feed(format!(
                "feed on '{}' lagged behind by {} events",
                self.collection, missed
            ))),
        }
    }

    async fn close(&mut self) {
        self.receiver = None;
    }
}

/// Cursor over a point-in-time snapshot of the record map.
struct MemoryCursor {
    records: Vec<SourceRecord>,
    position: usize,
    page_size: usize,
}

#[async_trait]
impl RecordCursor for MemoryCursor {
    async fn next(&mut self) -> Result<Option<SourceRecord>> {
        if self.position % self.page_size == 0 && self.position < self.records.len() {
            trace!(page = self.position / self.page_size, "cursor fetching next page");
        }
        let record = self.records.get(self.position).cloned();
        self.position += 1;
        Ok(record)
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn watch(&self) -> Result<Box<dyn ChangeFeed>> {
        Ok(Box::new(MemoryFeed {
            collection: self.name.clone(),
            receiver: Some(self.events.subscribe()),
        }))
    }

    async fn scan(&self, page_size: usize) -> Result<Box<dyn RecordCursor>> {
        let records = self
            .records
            .read()
            .await
            .iter()
            .map(|(id, document)| SourceRecord {
                id: id.clone(),
                document: document.clone(),
            })
            .collect();
        Ok(Box::new(MemoryCursor {
            records,
            position: 0,
            page_size: page_size.max(1),
        }))
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn bulk_upsert(&self, ops: Vec<UpsertOp>) -> Result<BulkWriteOutcome> {
        let mut records = self.records.write().await;
        let mut outcome = BulkWriteOutcome::default();
        for op in ops {
            if records.contains_key(&op.id) {
                outcome.modified += 1;
            } else {
                outcome.upserted += 1;
            }
            let doc = records.entry(op.id).or_insert_with(Map::new);
            for (path, value) in op.fields {
                set_path(doc, &path, value);
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: &[(&str, &str)]) -> Document {
        let mut doc = Map::new();
        for (k, v) in pairs {
            doc.insert(k.to_string(), Value::String(v.to_string()));
        }
        doc
    }

    #[tokio::test]
    async fn test_feed_delivers_mutations_in_order() {
        let store = MemoryStore::new("customers");
        let mut feed = store.watch().await.unwrap();

        store.insert("a".to_string(), doc(&[("firstName", "Ann")])).await;
        store.update("a".to_string(), doc(&[("lastName", "Smith")])).await;
        store.delete("a").await;

        match feed.next().await.unwrap().unwrap() {
            ChangeEvent::Insert { id, .. } => assert_eq!(id, "a"),
            other => panic!("expected insert, got {:?}", other),
        }
        match feed.next().await.unwrap().unwrap() {
            ChangeEvent::Update { updated_fields, .. } => {
                assert_eq!(updated_fields["lastName"], "Smith");
            }
            other => panic!("expected update, got {:?}", other),
        }
        match feed.next().await.unwrap().unwrap() {
            ChangeEvent::Other { operation, id } => {
                assert_eq!(operation, "delete");
                assert_eq!(id.as_deref(), Some("a"));
            }
            other => panic!("expected delete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_feed_returns_none() {
        let store = MemoryStore::new("customers");
        let mut feed = store.watch().await.unwrap();
        feed.close().await;
        assert!(feed.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_returns_snapshot() {
        let store = MemoryStore::new("customers");
        for i in 0..5 {
            store.insert(format!("id-{}", i), doc(&[("n", "v")])).await;
        }

        let mut cursor = store.scan(2).await.unwrap();
        let mut seen = 0;
        while let Some(record) = cursor.next().await.unwrap() {
            assert!(record.id.starts_with("id-"));
            seen += 1;
        }
        assert_eq!(seen, 5);
    }

    #[tokio::test]
    async fn test_bulk_upsert_creates_and_merges() {
        let store = MemoryStore::new("customers_anonymised");

        let first = vec![UpsertOp {
            id: "x".to_string(),
            fields: doc(&[("firstName", "qqqqqqqq"), ("address.postcode", "zzzzzzzz")]),
        }];
        let outcome = store.bulk_upsert(first).await.unwrap();
        assert_eq!(outcome.upserted, 1);
        assert_eq!(outcome.modified, 0);

        let stored = store.get("x").await.unwrap();
        assert_eq!(stored["firstName"], "qqqqqqqq");
        assert_eq!(stored["address"]["postcode"], "zzzzzzzz");

        // Partial second write leaves unrelated fields alone.
        let second = vec![UpsertOp {
            id: "x".to_string(),
            fields: doc(&[("lastName", "rrrrrrrr")]),
        }];
        let outcome = store.bulk_upsert(second).await.unwrap();
        assert_eq!(outcome.upserted, 0);
        assert_eq!(outcome.modified, 1);

        let stored = store.get("x").await.unwrap();
        assert_eq!(stored["firstName"], "qqqqqqqq");
        assert_eq!(stored["lastName"], "rrrrrrrr");
    }

    #[tokio::test]
    async fn test_bulk_upsert_is_idempotent() {
        let store = MemoryStore::new("customers_anonymised");
        let ops = vec![
            UpsertOp {
                id: "a".to_string(),
                fields: doc(&[("firstName", "qqqqqqqq")]),
            },
            UpsertOp {
                id: "b".to_string(),
                fields: doc(&[("firstName", "rrrrrrrr")]),
            },
        ];

        let first = store.bulk_upsert(ops.clone()).await.unwrap();
        let state_after_first = (store.get("a").await, store.get("b").await);

        // Applying the same drained batch again (duplicate delivery or a
        // retry) converges on the identical final state.
        let second = store.bulk_upsert(ops).await.unwrap();
        assert_eq!(first.upserted, 2);
        assert_eq!(second.upserted, 0);
        assert_eq!((store.get("a").await, store.get("b").await), state_after_first);
    }
}
