use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::readiness::ReadinessGate;
use crate::store::ConfigStore;
use crate::traits::{Gateway, Service};

/// Outcome of a single provisioning tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polled {
    NotReady,
    Provisioned,
    AlreadyDone,
}

/// One-shot, retry-until-ready record provisioning.
///
/// Ticks until the readiness gate opens, then disables itself and creates a
/// default record for every guild and member the gateway knows about,
/// followed by a full save. The disable happens before any provisioning
/// work, so a slow pass can never be re-entered by a later tick.
pub struct ConfigProvisioner {
    store: Arc<ConfigStore>,
    gateway: Arc<dyn Gateway>,
    gate: Arc<ReadinessGate>,
    tick: Duration,
    done: AtomicBool,
    cancel: CancellationToken,
}

impl ConfigProvisioner {
    pub fn new(
        store: Arc<ConfigStore>,
        gateway: Arc<dyn Gateway>,
        gate: Arc<ReadinessGate>,
        tick: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            gateway,
            gate,
            tick,
            done: AtomicBool::new(false),
            cancel,
        }
    }

    /// Run one tick of the retry loop.
    pub async fn poll_once(&self) -> Polled {
        if !self.gate.is_ready() {
            warn!(
                retry_secs = self.tick.as_secs(),
                "gateway not ready, retrying record provisioning"
            );
            return Polled::NotReady;
        }
        if self
            .done
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Polled::AlreadyDone;
        }
        if let Err(e) = self.provision().await {
            // Release the guard so a later tick retries.
            warn!(error = %e, "record provisioning failed, will retry");
            self.done.store(false, Ordering::SeqCst);
            return Polled::NotReady;
        }
        Polled::Provisioned
    }

    async fn provision(&self) -> anyhow::Result<()> {
        info!("gateway ready, provisioning missing records");
        let guilds = self.gateway.known_guilds().await?;
        let (users_created, guilds_created) = self.store.ensure_all(&guilds).await;
        self.store.save().await?;
        info!(users_created, guilds_created, "record provisioning complete");
        Ok(())
    }
}

#[async_trait]
impl Service for ConfigProvisioner {
    fn name(&self) -> &str {
        "provisioner"
    }

    async fn start(self: Arc<Self>) -> anyhow::Result<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.tick) => {}
                }
                match self.poll_once().await {
                    Polled::NotReady => continue,
                    Polled::Provisioned | Polled::AlreadyDone => break,
                }
            }
        });
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}
