//! Full-scan bootstrap of the target from the source.
//!
//! Walks every source record through the same buffer-and-flush path the
//! listener uses, in fixed-size chunks with a synchronous flush between
//! chunks, so peak memory stays bounded regardless of source size. Runs
//! exactly once per invocation: as the whole job in full-reindex mode, or
//! as a warm-up pass before continuous mode to catch records that existed
//! before the feed subscription began.

use std::time::Instant;

use tracing::info;

use crate::buffer::PendingBuffer;
use crate::error::Result;
use crate::flush::Flusher;
use crate::store::SourceStore;

/// Reindex tuning.
#[derive(Debug, Clone)]
pub struct ReindexConfig {
    /// Server-side page size for the forward scan.
    pub page_size: usize,
    /// Records buffered per chunk before a synchronous flush.
    pub chunk_size: usize,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            chunk_size: 1000,
        }
    }
}

/// What a completed reindex covered.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReindexSummary {
    /// Source records walked.
    pub records: u64,
    /// Flush batches issued.
    pub batches: u64,
}

/// Walk the entire source and funnel it through the buffer to the target.
///
/// An error opening or advancing the cursor is connectivity, not a feed
/// hiccup, and propagates to the caller; full-reindex mode treats it as
/// fatal.
pub async fn run(
    source: &dyn SourceStore,
    buffer: &PendingBuffer,
    flusher: &Flusher,
    config: &ReindexConfig,
) -> Result<ReindexSummary> {
    let started = Instant::now();
    let mut cursor = source.scan(config.page_size).await?;
    let mut summary = ReindexSummary::default();

    loop {
        let mut filled = 0usize;
        while filled < config.chunk_size {
            match cursor.next().await? {
                Some(record) => {
                    buffer.put(record.id, record.document).await;
                    filled += 1;
                }
                None => break,
            }
        }
        if filled == 0 {
            break;
        }

        match buffer.created_at_range().await {
            Some((earliest, latest)) => info!(
                records = filled,
                earliest = %earliest.to_rfc3339(),
                latest = %latest.to_rfc3339(),
                "flushing reindex chunk"
            ),
            None => info!(records = filled, "flushing reindex chunk"),
        }
        flusher.flush().await;

        summary.records += filled as u64;
        summary.batches += 1;
        if filled < config.chunk_size {
            break;
        }
    }

    info!(
        records = summary.records,
        batches = summary.batches,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "reindex complete"
    );
    Ok(summary)
}
