//! Pipeline assembly and run modes.
//!
//! Wires one source, one target and the shared pending buffer into the
//! two supported modes: a one-shot full reindex, and the continuous
//! daemon (listener plus scheduled flusher, preceded by a warm-up
//! reindex so records that predate the subscription are covered).

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::buffer::PendingBuffer;
use crate::config::SyncConfig;
use crate::error::{Result, VeilError};
use crate::flush::{FlushStatsSnapshot, Flusher};
use crate::listener::{ChangeListener, ListenerConfig};
use crate::reindex::{self, ReindexConfig, ReindexSummary};
use crate::store::{SourceStore, TargetStore};

/// A fully wired sync pipeline over one source/target pair.
pub struct SyncPipeline {
    source: Arc<dyn SourceStore>,
    buffer: Arc<PendingBuffer>,
    flusher: Arc<Flusher>,
    listener: Arc<ChangeListener>,
    config: SyncConfig,
}

impl SyncPipeline {
    pub fn new(
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
        config: SyncConfig,
    ) -> Self {
        let buffer = Arc::new(PendingBuffer::new());
        let flusher = Arc::new(Flusher::new(buffer.clone(), target));
        let listener = Arc::new(ChangeListener::new(
            source.clone(),
            buffer.clone(),
            flusher.clone(),
            ListenerConfig {
                eager_flush_threshold: config.eager_flush_threshold,
                reconnect_backoff: config.reconnect_backoff,
            },
        ));

        Self {
            source,
            buffer,
            flusher,
            listener,
            config,
        }
    }

    /// Flush activity so far.
    pub fn stats(&self) -> FlushStatsSnapshot {
        self.flusher.stats()
    }

    /// One-shot mode: copy every source record to the target and return.
    /// A connectivity error aborts the run and propagates.
    pub async fn full_reindex(&self) -> Result<ReindexSummary> {
        reindex::run(
            self.source.as_ref(),
            &self.buffer,
            &self.flusher,
            &self.reindex_config(),
        )
        .await
    }

    /// Continuous mode: tail the change feed and flush on a schedule
    /// until shutdown.
    ///
    /// The listener starts before the warm-up reindex so no change slips
    /// between the scan and the subscription; anything observed twice
    /// converges through the idempotent upserts. The warm-up failing is
    /// fatal, the daemon does not run against an unknown baseline.
    pub async fn run_continuous(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener_task = {
            let listener = self.listener.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { listener.run(shutdown).await })
        };

        let summary = reindex::run(
            self.source.as_ref(),
            &self.buffer,
            &self.flusher,
            &self.reindex_config(),
        )
        .await?;
        info!(
            records = summary.records,
            batches = summary.batches,
            "warm-up reindex complete, entering continuous sync"
        );

        let flusher_task = {
            let flusher = self.flusher.clone();
            let period = self.config.flush_interval;
            tokio::spawn(async move { flusher.run(period, shutdown).await })
        };

        let (listener_res, flusher_res) = tokio::join!(listener_task, flusher_task);
        listener_res.map_err(|e| VeilError::Internal(format!("listener task panicked: {}", e)))?;
        flusher_res.map_err(|e| VeilError::Internal(format!("flush task panicked: {}", e)))?;

        // Final drain: whatever arrived after the last tick still goes out.
        self.flusher.flush().await;
        info!("sync pipeline stopped");
        Ok(())
    }

    fn reindex_config(&self) -> ReindexConfig {
        ReindexConfig {
            page_size: self.config.reindex_page_size,
            chunk_size: self.config.reindex_chunk_size,
        }
    }
}
