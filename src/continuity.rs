use std::path::PathBuf;

use tracing::{info, warn};

use crate::traits::Gateway;

/// Message sent to the armed destination once the process is back up.
const RESTART_NOTICE: &str = "Bot restarted successfully";

/// Carries a "notify this channel after restart" request across a process
/// restart via a marker file. The file's presence is the entire pending
/// signal; no other flag is persisted.
pub struct RestartContinuity {
    marker_path: PathBuf,
}

impl RestartContinuity {
    pub fn new(marker_path: impl Into<PathBuf>) -> Self {
        Self {
            marker_path: marker_path.into(),
        }
    }

    /// Record the destination to notify after the restart. Called
    /// immediately before a deliberate restart is triggered.
    #[allow(dead_code)] // The restart trigger lives in the command layer.
    pub fn arm(&self, guild_id: u64, channel_id: u64) -> anyhow::Result<()> {
        std::fs::write(&self.marker_path, format!("{guild_id} {channel_id}"))?;
        info!(guild_id, channel_id, "restart marker written");
        Ok(())
    }

    /// Consume a pending marker, if any. Returns whether a marker was found.
    ///
    /// Best effort: parse, resolve, and send failures come back as `Err`
    /// for the caller to log, never to propagate. The marker is removed in
    /// every outcome, so the notification fires at most once per restart.
    pub async fn consume_if_present(&self, gateway: &dyn Gateway) -> anyhow::Result<bool> {
        if !self.marker_path.exists() {
            return Ok(false);
        }
        let outcome = self.notify(gateway).await;
        if let Err(e) = std::fs::remove_file(&self.marker_path) {
            warn!(error = %e, "failed to remove restart marker");
        }
        outcome.map(|()| true)
    }

    async fn notify(&self, gateway: &dyn Gateway) -> anyhow::Result<()> {
        let body = std::fs::read_to_string(&self.marker_path)?;
        let mut fields = body.split_whitespace();
        let (Some(guild), Some(channel)) = (fields.next(), fields.next()) else {
            anyhow::bail!("restart marker has fewer than two fields");
        };
        let guild_id: u64 = guild.parse()?;
        let channel_id: u64 = channel.parse()?;
        // Discord ids are nonzero; reject here instead of panicking in the
        // resolver's id constructors.
        if guild_id == 0 || channel_id == 0 {
            anyhow::bail!("restart marker ids must be nonzero");
        }
        let destination = gateway.resolve_destination(guild_id, channel_id).await?;
        gateway.send(destination, RESTART_NOTICE).await?;
        info!(guild_id, channel_id, "restart notification delivered");
        Ok(())
    }
}
