use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RollpointError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub datastore: DatastoreConfig,
    #[serde(default)]
    pub backups: BackupsConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub restore: RestoreConfig,
    #[serde(default)]
    pub log_queue: LogQueueConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            datastore: DatastoreConfig::default(),
            backups: BackupsConfig::default(),
            retention: RetentionConfig::default(),
            restore: RestoreConfig::default(),
            log_queue: LogQueueConfig::default(),
        }
    }
}

impl Config {
    /// Load config: defaults, then global file, then project file, then env.
    ///
    /// An explicit path (flag or `ROLLPOINT_CONFIG`) replaces the layered
    /// file lookup entirely.
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("ROLLPOINT_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(base) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&base.join("rollpoint/config.toml"))
    }

    fn load_project(root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&root.join("config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| RollpointError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| RollpointError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.datastore {
            self.datastore.merge(patch);
        }
        if let Some(patch) = patch.backups {
            self.backups.merge(patch);
        }
        if let Some(patch) = patch.retention {
            self.retention.merge(patch);
        }
        if let Some(patch) = patch.restore {
            self.restore.merge(patch);
        }
        if let Some(patch) = patch.log_queue {
            self.log_queue.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_string("ROLLPOINT_DATASTORE_FILE") {
            self.datastore.file_name = value;
        }
        if let Some(value) = env_string("ROLLPOINT_BACKUPS_DIR") {
            self.backups.dir = value;
        }
        if let Some(value) = env_u32("ROLLPOINT_RETENTION_DAYS")? {
            self.retention.log_days = value;
        }
        if let Some(value) = env_bool("ROLLPOINT_PRE_RESTORE_BACKUP") {
            self.restore.pre_restore_backup = value;
        }
        if let Some(values) = env_list("ROLLPOINT_CRITICAL_TABLES")? {
            self.restore.critical_tables = values;
        }
        if let Some(value) = env_u32("ROLLPOINT_LOG_QUEUE_CAPACITY")? {
            self.log_queue.capacity = value as usize;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.datastore.file_name.is_empty() {
            return Err(RollpointError::Config(
                "datastore.file_name must not be empty".to_string(),
            ));
        }
        if self.log_queue.capacity == 0 {
            return Err(RollpointError::Config(
                "log_queue.capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// File name of the live datastore, relative to the root directory.
    pub file_name: String,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            file_name: "store.db".to_string(),
        }
    }
}

impl DatastoreConfig {
    fn merge(&mut self, patch: DatastorePatch) {
        if let Some(file_name) = patch.file_name {
            self.file_name = file_name;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupsConfig {
    /// Backup tree, relative to the root directory.
    pub dir: String,
    /// Sub-area for recovery point snapshots.
    pub snapshots_subdir: String,
    /// Sub-area for pre-restore safety snapshots.
    pub pre_restore_subdir: String,
}

impl Default for BackupsConfig {
    fn default() -> Self {
        Self {
            dir: "backups".to_string(),
            snapshots_subdir: "snapshots".to_string(),
            pre_restore_subdir: "pre_restore".to_string(),
        }
    }
}

impl BackupsConfig {
    fn merge(&mut self, patch: BackupsPatch) {
        if let Some(dir) = patch.dir {
            self.dir = dir;
        }
        if let Some(subdir) = patch.snapshots_subdir {
            self.snapshots_subdir = subdir;
        }
        if let Some(subdir) = patch.pre_restore_subdir {
            self.pre_restore_subdir = subdir;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Unpinned log entries older than this many days are eligible for
    /// pruning. Logs are cheap; the default is deliberately generous.
    pub log_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { log_days: 30 }
    }
}

impl RetentionConfig {
    fn merge(&mut self, patch: RetentionPatch) {
        if let Some(days) = patch.log_days {
            self.log_days = days;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Default for taking a safety snapshot before a restore. Callers can
    /// still opt out per call; without the snapshot a failed restore cannot
    /// be rolled back.
    pub pre_restore_backup: bool,
    /// Tables probed by the post-restore consistency check.
    pub critical_tables: Vec<String>,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            pre_restore_backup: true,
            critical_tables: vec![
                "transaction_log".to_string(),
                "recovery_points".to_string(),
            ],
        }
    }
}

impl RestoreConfig {
    fn merge(&mut self, patch: RestorePatch) {
        if let Some(value) = patch.pre_restore_backup {
            self.pre_restore_backup = value;
        }
        if let Some(tables) = patch.critical_tables {
            self.critical_tables = tables;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQueueConfig {
    /// Bounded capacity of the fire-and-forget append queue.
    pub capacity: usize,
}

impl Default for LogQueueConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl LogQueueConfig {
    fn merge(&mut self, patch: LogQueuePatch) {
        if let Some(capacity) = patch.capacity {
            self.capacity = capacity;
        }
    }
}

// -----------------------------------------------------------------------------
// Patches (partial configs from files)
// -----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    datastore: Option<DatastorePatch>,
    backups: Option<BackupsPatch>,
    retention: Option<RetentionPatch>,
    restore: Option<RestorePatch>,
    log_queue: Option<LogQueuePatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatastorePatch {
    file_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BackupsPatch {
    dir: Option<String>,
    snapshots_subdir: Option<String>,
    pre_restore_subdir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RetentionPatch {
    log_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RestorePatch {
    pre_restore_backup: Option<bool>,
    critical_tables: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LogQueuePatch {
    capacity: Option<usize>,
}

// -----------------------------------------------------------------------------
// Env helpers
// -----------------------------------------------------------------------------

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|v| matches!(v.as_str(), "1" | "true" | "yes" | "on"))
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|err| RollpointError::Config(format!("{key}: {err}"))),
    }
}

fn env_list(key: &str) -> Result<Option<Vec<String>>> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => Ok(Some(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
        )),
    }
}
