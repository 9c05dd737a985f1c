//! Coalescing buffer of pending record state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::types::{fields, Document, RecordId};

/// Coalescing map of record identifier to the latest pending field set.
///
/// Two producers write into the buffer (the change listener and the
/// reindex scan); the flusher drains it. Writes for an identifier replace
/// any earlier pending entry: only the latest state matters, because the
/// target is overwritten with exactly that state on flush.
///
/// Draining snapshots and clears the whole map in one step under the lock,
/// so a flush never observes a half-drained buffer while new writes keep
/// arriving. The buffer carries no history; entries not yet flushed when
/// the process exits are lost.
///
/// Instances are created per pipeline and passed to the listener, flusher
/// and reindex explicitly. There is no process-wide buffer.
#[derive(Default)]
pub struct PendingBuffer {
    entries: Mutex<HashMap<RecordId, Document>>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest pending state for an identifier, replacing any
    /// earlier entry (last-write-wins coalescing).
    pub async fn put(&self, id: RecordId, pending: Document) {
        self.entries.lock().await.insert(id, pending);
    }

    /// Number of distinct identifiers currently pending.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Atomically snapshot and clear all pending entries.
    pub async fn drain(&self) -> Vec<(RecordId, Document)> {
        let mut entries = self.entries.lock().await;
        entries.drain().collect()
    }

    /// Earliest and latest creation timestamps among pending entries.
    ///
    /// Purely for observability during reindex; entries without a
    /// parseable `createdAt` are skipped.
    pub async fn created_at_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let entries = self.entries.lock().await;
        let mut range: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
        for doc in entries.values() {
            let Some(Value::String(raw)) = doc.get(fields::CREATED_AT) else {
                continue;
            };
            let Ok(ts) = DateTime::parse_from_rfc3339(raw) else {
                continue;
            };
            let ts = ts.with_timezone(&Utc);
            range = Some(match range {
                None => (ts, ts),
                Some((earliest, latest)) => (earliest.min(ts), latest.max(ts)),
            });
        }
        range
    }
}
