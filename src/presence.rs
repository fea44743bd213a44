use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::traits::{Gateway, Service};

/// Keeps the bot's activity text fresh: guild count plus uptime, refreshed
/// on a short repeating timer.
pub struct PresenceRefresh {
    gateway: Arc<dyn Gateway>,
    interval: Duration,
    started_at: Instant,
    cancel: CancellationToken,
}

impl PresenceRefresh {
    pub fn new(gateway: Arc<dyn Gateway>, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            gateway,
            interval,
            started_at: Instant::now(),
            cancel,
        }
    }

    async fn refresh(&self) {
        let guilds = self.gateway.guild_count().await;
        let uptime = self.started_at.elapsed();
        let text = format!(
            "{} guilds | up {}h {:02}m",
            guilds,
            uptime.as_secs() / 3600,
            (uptime.as_secs() % 3600) / 60
        );
        if let Err(e) = self.gateway.set_presence(&text).await {
            warn!(error = %e, "presence refresh failed");
        }
    }
}

#[async_trait]
impl Service for PresenceRefresh {
    fn name(&self) -> &str {
        "presence"
    }

    async fn start(self: Arc<Self>) -> anyhow::Result<()> {
        // Set once immediately, then keep refreshing.
        self.refresh().await;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
                self.refresh().await;
            }
        });
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGateway;
    use crate::traits::GuildSnapshot;

    #[tokio::test]
    async fn start_publishes_presence_and_stop_cancels() {
        let gateway = Arc::new(MockGateway::new(vec![GuildSnapshot {
            id: 1,
            member_ids: vec![],
        }]));
        let presence = Arc::new(PresenceRefresh::new(
            Arc::clone(&gateway) as Arc<dyn Gateway>,
            Duration::from_millis(10),
            CancellationToken::new(),
        ));
        Arc::clone(&presence).start().await.unwrap();

        let first = gateway.presence_log.lock().await.len();
        assert!(first >= 1, "presence should be set on start");
        assert!(gateway.presence_log.lock().await[0].starts_with("1 guilds"));

        presence.stop().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let settled = gateway.presence_log.lock().await.len();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(gateway.presence_log.lock().await.len(), settled);
    }
}
