//! Test infrastructure: a scripted MockGateway and a countable Service.
//!
//! The mock records every side effect so tests can assert exact call
//! counts: one restart notice, one disconnect, and so on.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::traits::{Destination, Gateway, GuildSnapshot, Service};

/// Scripted gateway: a fixed guild enumeration, recorded sends and presence
/// updates, optionally failing sends.
pub struct MockGateway {
    guilds: Vec<GuildSnapshot>,
    reachable: Vec<(u64, u64)>,
    fail_sends: bool,
    /// (channel_id, text) pairs, in send order.
    pub sent: Mutex<Vec<(u64, String)>>,
    pub presence_log: Mutex<Vec<String>>,
    disconnects: AtomicUsize,
}

impl MockGateway {
    pub fn new(guilds: Vec<GuildSnapshot>) -> Self {
        Self {
            guilds,
            reachable: Vec::new(),
            fail_sends: false,
            sent: Mutex::new(Vec::new()),
            presence_log: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Make a guild/channel pair resolvable.
    pub fn with_reachable(mut self, guild_id: u64, channel_id: u64) -> Self {
        self.reachable.push((guild_id, channel_id));
        self
    }

    /// Every send returns an error.
    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn known_guilds(&self) -> anyhow::Result<Vec<GuildSnapshot>> {
        Ok(self.guilds.clone())
    }

    async fn guild_count(&self) -> usize {
        self.guilds.len()
    }

    async fn resolve_destination(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> anyhow::Result<Destination> {
        if self.reachable.contains(&(guild_id, channel_id)) {
            Ok(Destination { channel_id })
        } else {
            anyhow::bail!("destination {guild_id}/{channel_id} not found")
        }
    }

    async fn send(&self, destination: Destination, text: &str) -> anyhow::Result<()> {
        if self.fail_sends {
            anyhow::bail!("send failed (scripted)");
        }
        self.sent
            .lock()
            .await
            .push((destination.channel_id, text.to_string()));
        Ok(())
    }

    async fn set_presence(&self, text: &str) -> anyhow::Result<()> {
        self.presence_log.lock().await.push(text.to_string());
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Service that only counts its start and stop calls.
#[derive(Default)]
pub struct CountingService {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl CountingService {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Service for CountingService {
    fn name(&self) -> &str {
        "counting"
    }

    async fn start(self: Arc<Self>) -> anyhow::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
