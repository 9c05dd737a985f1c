//! Periodic, overlap-guarded flushing of the pending buffer to the target.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::anonymize;
use crate::buffer::PendingBuffer;
use crate::store::TargetStore;
use crate::types::UpsertOp;

/// Flush activity counters.
#[derive(Default)]
struct FlushStats {
    flushes: AtomicU64,
    records_flushed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of flush statistics.
#[derive(Debug, Clone, Copy)]
pub struct FlushStatsSnapshot {
    /// Completed flushes that wrote a batch.
    pub flushes: u64,
    /// Records written across all batches.
    pub records_flushed: u64,
    /// Flush attempts skipped because another flush was in flight.
    pub skipped: u64,
    /// Batches lost to a failed bulk write.
    pub failed: u64,
}

/// Drains the buffer, anonymizes every pending record and issues one
/// batched idempotent write to the target.
///
/// At most one flush is in flight at any instant. A scheduled tick (or an
/// eager flush request) arriving while a flush is running is skipped
/// entirely, never queued: a slow target throttles the whole pipeline
/// instead of stacking concurrent writers.
pub struct Flusher {
    buffer: Arc<PendingBuffer>,
    target: Arc<dyn TargetStore>,
    in_flight: Mutex<()>,
    stats: FlushStats,
}

impl Flusher {
    pub fn new(buffer: Arc<PendingBuffer>, target: Arc<dyn TargetStore>) -> Self {
        Self {
            buffer,
            target,
            in_flight: Mutex::new(()),
            stats: FlushStats::default(),
        }
    }

    /// Flush unless another flush is already in flight; in that case skip
    /// this attempt with a warning. Scheduled ticks and the listener's
    /// eager flushes both come through here.
    pub async fn try_flush(&self) {
        match self.in_flight.try_lock() {
            Ok(_guard) => self.flush_pending().await,
            Err(_) => {
                warn!("previous flush still running, skipping");
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Flush, waiting for any in-flight flush to finish first. The reindex
    /// path uses this: it must not read further until its chunk is out.
    pub async fn flush(&self) {
        let _guard = self.in_flight.lock().await;
        self.flush_pending().await;
    }

    async fn flush_pending(&self) {
        let batch = self.buffer.drain().await;
        if batch.is_empty() {
            return;
        }

        let count = batch.len();
        let ops: Vec<UpsertOp> = batch
            .into_iter()
            .map(|(id, pending)| UpsertOp {
                id,
                fields: anonymize::anonymize_fields(&pending),
            })
            .collect();

        match self.target.bulk_upsert(ops).await {
            Ok(outcome) => {
                self.stats.flushes.fetch_add(1, Ordering::Relaxed);
                self.stats.records_flushed.fetch_add(count as u64, Ordering::Relaxed);
                info!(
                    records = count,
                    upserted = outcome.upserted,
                    "flushed buffer to target"
                );
            }
            Err(e) => {
                // The batch was drained before the write, so it is gone:
                // nothing is requeued. The affected identifiers recover on
                // their next upstream touch or a future full reindex.
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(records = count, error = %e, "failed to flush buffer, batch dropped");
            }
        }
    }

    /// Run the periodic flush schedule until shutdown. Ticks missed while
    /// a flush is running are dropped, not replayed.
    pub async fn run(&self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        // First tick after one full period, not immediately.
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(period_ms = period.as_millis() as u64, "flush scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.try_flush().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("flush scheduler stopped");
    }

    pub fn stats(&self) -> FlushStatsSnapshot {
        FlushStatsSnapshot {
            flushes: self.stats.flushes.load(Ordering::Relaxed),
            records_flushed: self.stats.records_flushed.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }
}
