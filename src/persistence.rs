use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::store::ConfigStore;
use crate::traits::Service;

/// Unconditional fixed-interval flush of the whole record snapshot.
///
/// Crash insurance for long uptimes. Orderly shutdown and the OS signal
/// hook funnel into the same [`ConfigStore::save`] routine, so there is
/// exactly one persistence path.
pub struct PeriodicPersistence {
    store: Arc<ConfigStore>,
    interval: Duration,
    cancel: CancellationToken,
}

impl PeriodicPersistence {
    pub fn new(store: Arc<ConfigStore>, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            store,
            interval,
            cancel,
        }
    }

    async fn flush(&self) {
        if let Err(e) = self.store.save().await {
            warn!(error = %e, "periodic save failed");
        }
    }
}

#[async_trait]
impl Service for PeriodicPersistence {
    fn name(&self) -> &str {
        "persistence"
    }

    async fn start(self: Arc<Self>) -> anyhow::Result<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
                self.flush().await;
            }
        });
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}
