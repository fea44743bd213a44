use std::path::Path;

use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    /// File holding the bot token. Read once at startup; its absence is
    /// the only fatal startup error.
    #[serde(default = "default_token_path")]
    pub token_path: String,
    #[serde(default = "default_presence_interval_secs")]
    pub presence_interval_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
            presence_interval_secs: default_presence_interval_secs(),
        }
    }
}

fn default_token_path() -> String {
    "token.txt".to_string()
}

fn default_presence_interval_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Root directory for record files (`users/` and `guilds/` underneath).
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
    #[serde(default = "default_marker_path")]
    pub marker_path: String,
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,
    #[serde(default = "default_provision_tick_secs")]
    pub provision_tick_secs: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            marker_path: default_marker_path(),
            save_interval_secs: default_save_interval_secs(),
            provision_tick_secs: default_provision_tick_secs(),
        }
    }
}

fn default_config_dir() -> String {
    "config".to_string()
}

fn default_marker_path() -> String {
    "restart.marker".to_string()
}

fn default_save_interval_secs() -> u64 {
    60 * 60
}

fn default_provision_tick_secs() -> u64 {
    5
}

impl AppConfig {
    /// Load `config.toml` if present; a missing file means all defaults.
    /// A present-but-malformed file is an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = AppConfig::default();
        assert_eq!(config.discord.token_path, "token.txt");
        assert_eq!(config.data.save_interval_secs, 3600);
        assert_eq!(config.data.provision_tick_secs, 5);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [data]
            config_dir = "/var/lib/botd"
            "#,
        )
        .unwrap();
        assert_eq!(config.data.config_dir, "/var/lib/botd");
        assert_eq!(config.data.marker_path, "restart.marker");
        assert_eq!(config.discord.presence_interval_secs, 10);
    }
}
