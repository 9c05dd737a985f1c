//! Veil - continuous anonymizing replication for customer records.
//!
//! Veil mirrors a source collection of customer records into a target
//! collection whose personal fields are replaced with deterministic
//! pseudonyms. The copy stays near-real-time (within one flush interval
//! plus feed latency) without ever writing raw personal data to the
//! target.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          veil                            │
//! ├──────────────────────────────────────────────────────────┤
//! │  Listener: change feed tail | reconnect | coalescing     │
//! ├──────────────────────────────────────────────────────────┤
//! │  Buffer: latest pending state per record identifier      │
//! ├──────────────────────────────────────────────────────────┤
//! │  Flusher: anonymize | batched idempotent upserts         │
//! ├──────────────────────────────────────────────────────────┤
//! │  Reindex: chunked full scan for bootstrap and repair     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use veil::config::VeilConfig;
//!
//! #[tokio::main]
//! async fn main() -> veil::Result<()> {
//!     let config = VeilConfig::development();
//!     veil::run(config, true).await
//! }
//! ```
//!
//! The binary runs against the bundled in-memory store. A real
//! deployment implements the [`store`] traits over its own driver and
//! drives [`pipeline::SyncPipeline`] directly.

pub mod anonymize;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod error;
pub mod flush;
pub mod listener;
pub mod observability;
pub mod pipeline;
pub mod producer;
pub mod reindex;
pub mod shutdown;
pub mod store;
pub mod types;

// Re-exports
pub use error::{Result, VeilError};

use std::sync::Arc;

use config::VeilConfig;
use pipeline::SyncPipeline;
use producer::Producer;
use reindex::ReindexSummary;
use shutdown::{ShutdownCoordinator, SignalHandler};
use store::MemoryStore;
use tracing::info;

/// Run the continuous sync daemon over the in-memory store pair until a
/// termination signal arrives. With `with_producer` a synthetic writer
/// feeds the source so the pipeline has something to mirror.
pub async fn run(config: VeilConfig, with_producer: bool) -> Result<()> {
    config.validate()?;
    observability::init(&config.observability)?;

    let source = Arc::new(MemoryStore::new(config.collections.source.clone()));
    let target = Arc::new(MemoryStore::new(config.collections.target.clone()));
    let pipeline = SyncPipeline::new(source.clone(), target.clone(), config.sync.clone());

    let coordinator = ShutdownCoordinator::new();
    tokio::spawn(SignalHandler::new(coordinator.clone()).run());

    let producer_task = with_producer.then(|| {
        let producer = Producer::new(source.clone(), config.producer.clone());
        let shutdown = coordinator.watch();
        tokio::spawn(async move { producer.run(shutdown).await })
    });

    info!(
        source = %config.collections.source,
        target = %config.collections.target,
        "starting sync daemon"
    );
    pipeline.run_continuous(coordinator.watch()).await?;

    if let Some(task) = producer_task {
        let produced = task
            .await
            .map_err(|e| VeilError::Internal(format!("producer task panicked: {}", e)))?;
        info!(produced, mirrored = target.len().await, "producer summary");
    }

    let stats = pipeline.stats();
    info!(
        flushes = stats.flushes,
        records = stats.records_flushed,
        skipped = stats.skipped,
        failed = stats.failed,
        "final flush statistics"
    );
    Ok(())
}

/// Run a one-shot full reindex over the in-memory store pair and return
/// its summary.
pub async fn run_full_reindex(config: VeilConfig) -> Result<ReindexSummary> {
    config.validate()?;
    observability::init(&config.observability)?;

    let source = Arc::new(MemoryStore::new(config.collections.source.clone()));
    let target = Arc::new(MemoryStore::new(config.collections.target.clone()));
    let pipeline = SyncPipeline::new(source, target, config.sync.clone());
    pipeline.full_reindex().await
}

/// Run only the synthetic producer until a termination signal arrives.
pub async fn run_producer(config: VeilConfig) -> Result<()> {
    config.validate()?;
    observability::init(&config.observability)?;

    let source = Arc::new(MemoryStore::new(config.collections.source.clone()));
    let producer = Producer::new(source, config.producer.clone());

    let coordinator = ShutdownCoordinator::new();
    tokio::spawn(SignalHandler::new(coordinator.clone()).run());

    producer.run(coordinator.watch()).await;
    Ok(())
}
