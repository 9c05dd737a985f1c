//! Change listener: feed subscription, event classification, coalescing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::buffer::PendingBuffer;
use crate::flush::Flusher;
use crate::store::{ChangeFeed, SourceStore};
use crate::types::ChangeEvent;

/// Listener tuning.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Pending entries beyond which the listener flushes without waiting
    /// for the next scheduled tick. Bounds memory and batch size under
    /// bursty write load.
    pub eager_flush_threshold: usize,
    /// Fixed delay before re-subscribing after a feed disruption.
    pub reconnect_backoff: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            eager_flush_threshold: 1000,
            reconnect_backoff: Duration::from_secs(5),
        }
    }
}

/// Tails the source's change feed and coalesces record state into the
/// pending buffer.
///
/// Insert and replace events carry the full document; update events carry
/// only the changed fields. All three overwrite any earlier pending entry
/// for the identifier. Everything else (notably deletion) is rejected and
/// logged; the target is never mutated for those events.
pub struct ChangeListener {
    source: Arc<dyn SourceStore>,
    buffer: Arc<PendingBuffer>,
    flusher: Arc<Flusher>,
    config: ListenerConfig,
}

impl ChangeListener {
    pub fn new(
        source: Arc<dyn SourceStore>,
        buffer: Arc<PendingBuffer>,
        flusher: Arc<Flusher>,
        config: ListenerConfig,
    ) -> Self {
        Self {
            source,
            buffer,
            flusher,
            config,
        }
    }

    /// Tail the change feed until shutdown.
    ///
    /// Feed disruptions and unexpected closes are retried indefinitely
    /// with a fixed backoff; a failure to open the feed in the first place
    /// is treated the same way, never as fatal — the listener favors
    /// availability over fast failure. Reconnection re-subscribes from
    /// "now": no resume position is persisted, so events during an outage
    /// are only recovered by a later reindex or the next upstream touch.
    ///
    /// An explicit stop closes the subscription and suppresses any
    /// further reconnect attempt.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        while !*shutdown.borrow() {
            let mut feed = match self.source.watch().await {
                Ok(feed) => feed,
                Err(e) => {
                    error!(error = %e, "failed to open change feed");
                    if wait_backoff(&mut shutdown, self.config.reconnect_backoff).await {
                        break;
                    }
                    continue;
                }
            };

            info!("change feed opened");
            if !self.tail(feed.as_mut(), &mut shutdown).await {
                // Stop requested: close and never reconnect.
                feed.close().await;
                break;
            }

            if wait_backoff(&mut shutdown, self.config.reconnect_backoff).await {
                break;
            }
        }

        debug!("change listener stopped");
    }

    /// Consume events until the feed drops or shutdown fires. Returns
    /// `true` when the caller should reconnect, `false` on shutdown.
    async fn tail(&self, feed: &mut dyn ChangeFeed, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return false;
                    }
                }
                event = feed.next() => match event {
                    Ok(Some(event)) => self.observe(event).await,
                    Ok(None) => {
                        warn!("change feed closed by source");
                        return true;
                    }
                    Err(e) => {
                        warn!(error = %e, "change feed disrupted");
                        return true;
                    }
                },
            }
        }
    }

    /// Classify and buffer one change event.
    async fn observe(&self, event: ChangeEvent) {
        let (id, pending) = match event {
            ChangeEvent::Insert { id, document } | ChangeEvent::Replace { id, document } => {
                (id, document)
            }
            ChangeEvent::Update { id, updated_fields } => (id, updated_fields),
            ChangeEvent::Other { operation, id } => {
                // Deletions are not propagated; the target keeps its copy.
                error!(operation = %operation, id = ?id, "unsupported change event, ignoring");
                return;
            }
        };

        self.buffer.put(id, pending).await;

        let pending_count = self.buffer.len().await;
        if pending_count > self.config.eager_flush_threshold {
            info!(pending = pending_count, "buffer over threshold, flushing early");
            self.flusher.try_flush().await;
        }
    }
}

/// Sleep for the reconnect backoff, bailing out early on shutdown.
/// Returns `true` when shutdown was requested during the wait.
async fn wait_backoff(shutdown: &mut watch::Receiver<bool>, backoff: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(backoff) => *shutdown.borrow(),
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
