//! Backup manager: datastore file snapshots and integrity verification.
//!
//! A snapshot is an exact byte copy of the live datastore file paired with
//! a SHA-256 digest of the copy. The digest is computed over the copied
//! bytes, not the live file, so concurrent writes to the live store cannot
//! race the checksum. SHA-256 (not a CRC) makes `verify` a tamper-evidence
//! mechanism, not merely an accidental-corruption detector.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, RollpointError};

/// A completed snapshot: where the copy landed and what it hashed to.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the copied bytes.
    pub checksum: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Copies the live datastore into the backup tree and verifies copies
/// against their recorded digests.
#[derive(Debug, Clone)]
pub struct BackupManager {
    datastore_path: PathBuf,
    snapshots_dir: PathBuf,
    pre_restore_dir: PathBuf,
}

impl BackupManager {
    pub fn new(
        datastore_path: impl Into<PathBuf>,
        snapshots_dir: impl Into<PathBuf>,
        pre_restore_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            datastore_path: datastore_path.into(),
            snapshots_dir: snapshots_dir.into(),
            pre_restore_dir: pre_restore_dir.into(),
        }
    }

    /// Wire the manager from the root directory and config layout.
    pub fn from_config(root: &Path, config: &Config) -> Self {
        let backups = root.join(&config.backups.dir);
        Self::new(
            root.join(&config.datastore.file_name),
            backups.join(&config.backups.snapshots_subdir),
            backups.join(&config.backups.pre_restore_subdir),
        )
    }

    /// Snapshot the live datastore into the recovery-point area.
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.copy_into(&self.snapshots_dir, "recovery_point")
    }

    /// Snapshot the live datastore into the pre-restore safety area.
    pub fn snapshot_pre_restore(&self) -> Result<Snapshot> {
        self.copy_into(&self.pre_restore_dir, "pre_restore")
    }

    /// Verify a backup file against its recorded digest.
    ///
    /// Reads and hashes the full file; size or mtime are never trusted.
    /// Read-only and safe to call repeatedly.
    pub fn verify(&self, path: &Path, expected_checksum: &str) -> Result<()> {
        if !path.exists() {
            return Err(RollpointError::MissingBackupFile(
                path.display().to_string(),
            ));
        }

        let actual = digest_file(path)?;
        if !actual.eq_ignore_ascii_case(expected_checksum) {
            return Err(RollpointError::ChecksumMismatch {
                path: path.display().to_string(),
                expected: expected_checksum.to_string(),
                actual,
            });
        }
        Ok(())
    }

    pub fn datastore_path(&self) -> &Path {
        &self.datastore_path
    }

    fn copy_into(&self, dir: &Path, prefix: &str) -> Result<Snapshot> {
        if !self.datastore_path.exists() {
            return Err(RollpointError::NoDatastoreFile(
                self.datastore_path.display().to_string(),
            ));
        }

        std::fs::create_dir_all(dir)?;
        let created_at = Utc::now();
        let dest = dir.join(format!("{prefix}_{}.db", file_stamp(created_at)));

        let size_bytes = std::fs::copy(&self.datastore_path, &dest)?;
        let checksum = digest_file(&dest)?;
        debug!(path = %dest.display(), size_bytes, "snapshot written");

        Ok(Snapshot {
            path: dest,
            checksum,
            size_bytes,
            created_at,
        })
    }
}

/// SHA-256 of a file's full contents, as lowercase hex.
pub fn digest_file(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// ISO-8601-derived file stamp with filesystem-unsafe characters replaced;
/// subsecond nanos keep names unique within one second.
fn file_stamp(ts: DateTime<Utc>) -> String {
    format!(
        "{}_{:09}",
        ts.format("%Y-%m-%dT%H-%M-%S"),
        ts.timestamp_subsec_nanos()
    )
}
