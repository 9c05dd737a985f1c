//! Common test utilities for integration tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use veil::config::SyncConfig;
use veil::pipeline::SyncPipeline;
use veil::store::MemoryStore;
use veil::types::{Address, Customer};

/// Test error type
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;

/// Deterministic customer fixture; `n` drives every field.
pub fn customer(n: usize) -> Customer {
    Customer {
        id: format!("cust-{:05}", n),
        first_name: format!("First{}", n),
        last_name: format!("Last{}", n),
        email: format!("first{}@example.com", n),
        address: Address {
            line1: format!("{} High Street", n + 1),
            line2: format!("Flat {}", n % 20),
            postcode: format!("AB{} {}CD", n % 10, n % 9),
            city: "Springfield".to_string(),
            state: "OR".to_string(),
            country: "US".to_string(),
        },
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
            + chrono::Duration::seconds(n as i64),
    }
}

/// Insert `count` fixture customers into a store.
pub async fn seed(store: &MemoryStore, count: usize) {
    for n in 0..count {
        let c = customer(n);
        store.insert(c.id.clone(), c.document()).await;
    }
}

/// Sync configuration with millisecond timers, for tests that wait on
/// real flush ticks.
pub fn fast_sync_config() -> SyncConfig {
    SyncConfig {
        flush_interval: Duration::from_millis(20),
        reconnect_backoff: Duration::from_millis(20),
        ..SyncConfig::default()
    }
}

/// A running continuous-mode pipeline over an in-memory store pair.
pub struct SyncHarness {
    pub source: Arc<MemoryStore>,
    pub target: Arc<MemoryStore>,
    stop: watch::Sender<bool>,
    task: JoinHandle<veil::Result<()>>,
}

impl SyncHarness {
    /// Build the store pair and start the daemon.
    pub fn start(config: SyncConfig) -> Self {
        let source = Arc::new(MemoryStore::new("customers"));
        let target = Arc::new(MemoryStore::new("customers_anonymised"));
        let pipeline = Arc::new(SyncPipeline::new(source.clone(), target.clone(), config));

        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move { pipeline.run_continuous(stop_rx).await });

        Self {
            source,
            target,
            stop,
            task,
        }
    }

    /// Poll until the target holds at least `count` records.
    pub async fn wait_for_target_len(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while self.target.len().await < count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "target never reached {} records",
                count
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Signal shutdown and wait for a clean exit. The final drain runs
    /// before this returns.
    pub async fn stop(self) -> Result<()> {
        self.stop.send(true)?;
        self.task.await??;
        Ok(())
    }
}
