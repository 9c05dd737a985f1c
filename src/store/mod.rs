//! Storage capability seams.
//!
//! The sync engine never talks to a storage driver directly. It consumes
//! the four traits below, which a deployment implements over its own
//! driver. The crate ships [`memory::MemoryStore`], an in-memory
//! implementation backing the test suite, the synthetic producer and the
//! demo binary.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{BulkWriteOutcome, ChangeEvent, SourceRecord, UpsertOp};

/// An open subscription to the source's ordered change feed.
#[async_trait]
pub trait ChangeFeed: Send {
    /// Wait for the next change event.
    ///
    /// `Ok(None)` means the feed was closed by the source. An error is a
    /// disruption the caller may recover from by re-subscribing. The
    /// returned future must be cancel-safe: the listener races it against
    /// its shutdown signal.
    async fn next(&mut self) -> Result<Option<ChangeEvent>>;

    /// Close the subscription. Subsequent `next` calls return `Ok(None)`.
    async fn close(&mut self);
}

/// Forward cursor over every record in the source.
#[async_trait]
pub trait RecordCursor: Send {
    async fn next(&mut self) -> Result<Option<SourceRecord>>;
}

/// Read capabilities required of the source data set.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Subscribe to the change feed, starting from now.
    async fn watch(&self) -> Result<Box<dyn ChangeFeed>>;

    /// Open a paginated forward scan over all records. `page_size` bounds
    /// how many records are fetched per round trip, not the total.
    async fn scan(&self, page_size: usize) -> Result<Box<dyn RecordCursor>>;
}

/// Write capability required of the target data set.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Apply a batch of idempotent upserts.
    ///
    /// Each operation filters on the record identifier, sets the given
    /// fields and creates the record if absent. Atomicity holds per
    /// operation, not across the batch.
    async fn bulk_upsert(&self, ops: Vec<UpsertOp>) -> Result<BulkWriteOutcome>;
}
