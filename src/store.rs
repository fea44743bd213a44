use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::RecordCorruptError;
use crate::traits::GuildSnapshot;

/// Fallback command prefix for guilds that never configured one.
pub const DEFAULT_PREFIX: &str = "!";

const RECORD_EXT: &str = "json";

/// Per-member progression data: prestiges, levels, experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LevelStats {
    pub prestige: u32,
    pub level: u32,
    pub experience: u32,
}

/// Per-user persistent record.
///
/// The id lives in the filename, never in the body; it is attached after
/// deserialization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(skip)]
    pub id: u64,
}

impl UserRecord {
    pub fn new(id: u64) -> Self {
        Self { id }
    }
}

/// Per-guild persistent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildRecord {
    #[serde(skip)]
    pub id: u64,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Member id -> progression data. Insertion order is irrelevant.
    #[serde(default)]
    pub level_data: HashMap<u64, LevelStats>,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl GuildRecord {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            prefix: default_prefix(),
            level_data: HashMap::new(),
        }
    }
}

/// The two in-memory collections backing every record on disk.
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    pub users: Vec<UserRecord>,
    pub guilds: Vec<GuildRecord>,
}

/// Disk-backed store for user and guild records: one file per id under
/// `users/` and `guilds/`.
///
/// The snapshot is the single shared mutable resource in the process. The
/// mutex scopes are one whole `load`, one whole `save`, one whole
/// provisioning batch (`ensure_all`), or one single upsert. `load` is not
/// safe against a concurrent `save`; it runs once, before any timer starts.
pub struct ConfigStore {
    users_dir: PathBuf,
    guilds_dir: PathBuf,
    snapshot: Mutex<ConfigSnapshot>,
}

impl ConfigStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            users_dir: data_dir.join("users"),
            guilds_dir: data_dir.join("guilds"),
            snapshot: Mutex::new(ConfigSnapshot::default()),
        }
    }

    /// Read every record file into memory, replacing the snapshot.
    ///
    /// Missing directories are created. A file whose body cannot be parsed
    /// is logged and skipped; the rest of the load continues.
    pub async fn load(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.users_dir)?;
        std::fs::create_dir_all(&self.guilds_dir)?;

        let mut fresh = ConfigSnapshot::default();
        for (id, mut user) in read_records::<UserRecord>(&self.users_dir)? {
            user.id = id;
            fresh.users.push(user);
        }
        for (id, mut guild) in read_records::<GuildRecord>(&self.guilds_dir)? {
            guild.id = id;
            fresh.guilds.push(guild);
        }
        info!(
            users = fresh.users.len(),
            guilds = fresh.guilds.len(),
            "loaded records from disk"
        );

        let mut snapshot = self.snapshot.lock().await;
        *snapshot = fresh;
        Ok(())
    }

    /// Flush every in-memory record to disk.
    ///
    /// Each record is written to a temp file and renamed over the target,
    /// so a partial write never corrupts an existing record. Safe to call
    /// from any number of timers once `load` has completed.
    pub async fn save(&self) -> anyhow::Result<()> {
        let snapshot = self.snapshot.lock().await;
        for user in &snapshot.users {
            write_record(&self.users_dir, user.id, user)?;
        }
        for guild in &snapshot.guilds {
            write_record(&self.guilds_dir, guild.id, guild)?;
        }
        Ok(())
    }

    /// Insert a default user record unless one exists. Returns whether a
    /// record was created.
    #[allow(dead_code)] // Single-upsert seam for the command layer.
    pub async fn ensure_user(&self, id: u64) -> bool {
        let mut snapshot = self.snapshot.lock().await;
        ensure_user_in(&mut snapshot, id)
    }

    /// Insert a default guild record unless one exists. Returns whether a
    /// record was created.
    #[allow(dead_code)] // Single-upsert seam for the command layer.
    pub async fn ensure_guild(&self, id: u64) -> bool {
        let mut snapshot = self.snapshot.lock().await;
        ensure_guild_in(&mut snapshot, id)
    }

    /// Materialize missing records for a whole enumeration in one critical
    /// section. Existing entities are skipped individually; the loop always
    /// continues to the next member and the next guild.
    pub async fn ensure_all(&self, guilds: &[GuildSnapshot]) -> (usize, usize) {
        let mut snapshot = self.snapshot.lock().await;
        let mut users_created = 0;
        let mut guilds_created = 0;
        for guild in guilds {
            for &member in &guild.member_ids {
                if ensure_user_in(&mut snapshot, member) {
                    users_created += 1;
                }
            }
            if ensure_guild_in(&mut snapshot, guild.id) {
                guilds_created += 1;
            }
        }
        (users_created, guilds_created)
    }

    /// Command prefix for a guild, if the guild is known.
    #[allow(dead_code)] // Read by the command layer.
    pub async fn guild_prefix(&self, id: u64) -> Option<String> {
        let snapshot = self.snapshot.lock().await;
        snapshot
            .guilds
            .iter()
            .find(|g| g.id == id)
            .map(|g| g.prefix.clone())
    }

    /// Run `f` against the guild record for `id`. Returns false when the
    /// guild is unknown. This is the mutation seam for command handlers.
    #[allow(dead_code)]
    pub async fn with_guild_mut<F>(&self, id: u64, f: F) -> bool
    where
        F: FnOnce(&mut GuildRecord),
    {
        let mut snapshot = self.snapshot.lock().await;
        match snapshot.guilds.iter_mut().find(|g| g.id == id) {
            Some(guild) => {
                f(guild);
                true
            }
            None => false,
        }
    }

    /// Clone of the current snapshot.
    #[allow(dead_code)]
    pub async fn snapshot(&self) -> ConfigSnapshot {
        self.snapshot.lock().await.clone()
    }
}

fn ensure_user_in(snapshot: &mut ConfigSnapshot, id: u64) -> bool {
    if snapshot.users.iter().any(|u| u.id == id) {
        return false;
    }
    snapshot.users.push(UserRecord::new(id));
    true
}

fn ensure_guild_in(snapshot: &mut ConfigSnapshot, id: u64) -> bool {
    if snapshot.guilds.iter().any(|g| g.id == id) {
        return false;
    }
    snapshot.guilds.push(GuildRecord::new(id));
    true
}

fn read_records<T: DeserializeOwned>(dir: &Path) -> anyhow::Result<Vec<(u64, T)>> {
    let mut records = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
            continue;
        }
        let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok())
        else {
            warn!(path = %path.display(), "record filename is not a numeric id, skipping");
            continue;
        };
        let body = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<T>(&body) {
            Ok(record) => records.push((id, record)),
            Err(source) => {
                let err = RecordCorruptError {
                    path: path.clone(),
                    source,
                };
                warn!(error = %err, "skipping corrupt record");
            }
        }
    }
    Ok(records)
}

fn write_record<T: Serialize>(dir: &Path, id: u64, record: &T) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(record)?;
    let path = dir.join(format!("{id}.{RECORD_EXT}"));
    let tmp = dir.join(format!("{id}.{RECORD_EXT}.tmp"));
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}
