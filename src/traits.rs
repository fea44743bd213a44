use std::sync::Arc;

use async_trait::async_trait;

/// A guild and its member ids as enumerated from the gateway.
#[derive(Debug, Clone)]
pub struct GuildSnapshot {
    pub id: u64,
    pub member_ids: Vec<u64>,
}

/// A resolved, sendable message target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub channel_id: u64,
}

/// Connection to the chat platform.
///
/// The core only needs a narrow surface: entity enumeration, destination
/// resolution, sending, presence, and disconnect. Readiness is reported
/// separately through [`crate::readiness::ReadinessGate`], fed by the
/// concrete implementation's ready event.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Enumerate every guild the bot can see, including member ids.
    /// Only valid once the readiness gate has opened.
    async fn known_guilds(&self) -> anyhow::Result<Vec<GuildSnapshot>>;

    /// Number of guilds currently visible. Cheap, cache-backed.
    async fn guild_count(&self) -> usize;

    /// Resolve a guild/channel id pair to a sendable destination.
    /// Errors when either id does not resolve.
    async fn resolve_destination(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> anyhow::Result<Destination>;

    async fn send(&self, destination: Destination, text: &str) -> anyhow::Result<()>;

    async fn set_presence(&self, text: &str) -> anyhow::Result<()>;

    /// Close the session and release the client.
    async fn disconnect(&self) -> anyhow::Result<()>;
}

/// A background service with a lifecycle.
///
/// Services are registered with the lifecycle as an explicit typed list;
/// registration order is start order, and stop runs in the same order
/// during shutdown.
#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    /// Activate the service. Long-running work is spawned, not awaited.
    async fn start(self: Arc<Self>) -> anyhow::Result<()>;

    /// Stop background work. Must be safe to call more than once.
    async fn stop(&self) -> anyhow::Result<()>;
}
