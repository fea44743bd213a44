use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort startup before any connection attempt is made.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("credential file {} not found; place the bot token there", .0.display())]
    CredentialMissing(PathBuf),
}

/// A record file whose body could not be parsed. Logged and skipped during
/// load; never fatal.
#[derive(Debug, Error)]
#[error("corrupt record {}: {source}", .path.display())]
pub struct RecordCorruptError {
    pub path: PathBuf,
    #[source]
    pub source: serde_json::Error,
}
