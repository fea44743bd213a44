use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    ActivityData, ChannelId, Context, EventHandler, GatewayIntents, GuildId, OnlineStatus, Ready,
};
use serenity::Client;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::readiness::ReadinessGate;
use crate::traits::{Destination, Gateway, GuildSnapshot};

/// Gateway implementation using the serenity library.
///
/// The client runs in a background task; the HTTP/cache handles are stored
/// after the client is built so trait methods can use the REST API, and the
/// shard messenger is captured on the ready event for presence updates.
pub struct DiscordGateway {
    token: String,
    gate: Arc<ReadinessGate>,
    http: Mutex<Option<Arc<serenity::http::Http>>>,
    cache: Mutex<Option<Arc<serenity::cache::Cache>>>,
    shard: std::sync::Mutex<Option<serenity::gateway::ShardMessenger>>,
    shard_manager: Mutex<Option<Arc<serenity::gateway::ShardManager>>>,
    ready_tx: watch::Sender<bool>,
}

impl DiscordGateway {
    pub fn new(token: &str, gate: Arc<ReadinessGate>) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            token: token.to_string(),
            gate,
            http: Mutex::new(None),
            cache: Mutex::new(None),
            shard: std::sync::Mutex::new(None),
            shard_manager: Mutex::new(None),
            ready_tx,
        }
    }

    /// Receiver that observes the first ready event. The latch never
    /// reverts, so late subscribers still see it.
    pub fn ready_signal(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    /// Authenticate and start the client in a background task.
    pub async fn connect(self: Arc<Self>) -> anyhow::Result<()> {
        let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;
        let handler = ReadyHandler {
            gateway: Arc::clone(&self),
        };
        let mut client = Client::builder(&self.token, intents)
            .event_handler(handler)
            .await?;

        {
            let mut http = self.http.lock().await;
            *http = Some(client.http.clone());
        }
        {
            let mut cache = self.cache.lock().await;
            *cache = Some(client.cache.clone());
        }
        {
            let mut manager = self.shard_manager.lock().await;
            *manager = Some(client.shard_manager.clone());
        }

        tokio::spawn(async move {
            if let Err(e) = client.start().await {
                warn!("Discord client error: {}", e);
            }
        });
        Ok(())
    }

    async fn get_http(&self) -> anyhow::Result<Arc<serenity::http::Http>> {
        let guard = self.http.lock().await;
        guard
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Discord HTTP client not ready"))
    }

    async fn get_cache(&self) -> anyhow::Result<Arc<serenity::cache::Cache>> {
        let guard = self.cache.lock().await;
        guard
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Discord cache not ready"))
    }
}

#[async_trait]
impl Gateway for DiscordGateway {
    async fn known_guilds(&self) -> anyhow::Result<Vec<GuildSnapshot>> {
        let http = self.get_http().await?;
        let cache = self.get_cache().await?;

        let mut snapshots = Vec::new();
        for guild_id in cache.guilds() {
            let members = guild_id.members(&http, None, None).await?;
            snapshots.push(GuildSnapshot {
                id: guild_id.get(),
                member_ids: members.iter().map(|m| m.user.id.get()).collect(),
            });
        }
        Ok(snapshots)
    }

    async fn guild_count(&self) -> usize {
        match self.cache.lock().await.as_ref() {
            Some(cache) => cache.guilds().len(),
            None => 0,
        }
    }

    async fn resolve_destination(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> anyhow::Result<Destination> {
        let http = self.get_http().await?;
        let channel = ChannelId::new(channel_id).to_channel(&http).await?;
        let Some(guild_channel) = channel.guild() else {
            anyhow::bail!("channel {channel_id} is not a guild channel");
        };
        if guild_channel.guild_id != GuildId::new(guild_id) {
            anyhow::bail!("channel {channel_id} does not belong to guild {guild_id}");
        }
        Ok(Destination { channel_id })
    }

    async fn send(&self, destination: Destination, text: &str) -> anyhow::Result<()> {
        let http = self.get_http().await?;
        ChannelId::new(destination.channel_id).say(&http, text).await?;
        Ok(())
    }

    async fn set_presence(&self, text: &str) -> anyhow::Result<()> {
        let shard = {
            let guard = self.shard.lock().unwrap_or_else(|p| p.into_inner());
            guard.clone()
        };
        let Some(shard) = shard else {
            anyhow::bail!("shard messenger not ready");
        };
        shard.set_presence(Some(ActivityData::custom(text)), OnlineStatus::DoNotDisturb);
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        let manager = self.shard_manager.lock().await.clone();
        if let Some(manager) = manager {
            manager.shutdown_all().await;
        }
        Ok(())
    }
}

/// Serenity event handler that feeds the readiness gate.
struct ReadyHandler {
    gateway: Arc<DiscordGateway>,
}

#[async_trait]
impl EventHandler for ReadyHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            username = %ready.user.name,
            guilds = ready.guilds.len(),
            "Discord session ready"
        );
        {
            let mut shard = self
                .gateway
                .shard
                .lock()
                .unwrap_or_else(|p| p.into_inner());
            *shard = Some(ctx.shard.clone());
        }
        // Ready can fire again on a session resume; the gate latches and
        // the watch send is a no-op after the first observation.
        self.gateway.gate.mark_ready();
        let _ = self.gateway.ready_tx.send(true);
    }
}
