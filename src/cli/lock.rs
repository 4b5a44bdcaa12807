//! Advisory file lock guarding restore and prune from the CLI side.
//!
//! The library itself never locks: single-writer exclusion during the
//! disconnect-swap-reconnect window is the caller's responsibility, and
//! for this binary the caller is the CLI layer.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, RollpointError};

/// Advisory file lock for coordinating restore and prune runs.
pub struct GlobalLock {
    #[allow(dead_code)]
    lock_file: File,
    #[allow(dead_code)]
    lock_path: PathBuf,
}

impl GlobalLock {
    const LOCK_FILENAME: &'static str = "rollpoint.lock";

    /// Acquire exclusive lock (blocking)
    pub fn acquire(root: &Path) -> Result<Self> {
        let lock_path = root.join(Self::LOCK_FILENAME);
        fs::create_dir_all(root)?;

        let lock_file = Self::open_lock_file(&lock_path)?;
        lock_file
            .lock_exclusive()
            .map_err(|e| RollpointError::LockFailed(format!("acquire exclusive lock: {e}")))?;

        Self::write_holder(&lock_path);
        debug!("Acquired global lock at {:?}", lock_path);
        Ok(Self {
            lock_file,
            lock_path,
        })
    }

    /// Try to acquire lock without blocking
    pub fn try_acquire(root: &Path) -> Result<Option<Self>> {
        let lock_path = root.join(Self::LOCK_FILENAME);
        fs::create_dir_all(root)?;

        let lock_file = Self::open_lock_file(&lock_path)?;
        match lock_file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                debug!("Lock held by another process");
                return Ok(None);
            }
            Err(e) => {
                return Err(RollpointError::LockFailed(format!("try acquire lock: {e}")));
            }
        }

        Self::write_holder(&lock_path);
        debug!("Acquired global lock (non-blocking) at {:?}", lock_path);
        Ok(Some(Self {
            lock_file,
            lock_path,
        }))
    }

    /// Acquire with timeout (polling)
    pub fn acquire_timeout(root: &Path, timeout: Duration) -> Result<Self> {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(50);

        while start.elapsed() < timeout {
            if let Some(lock) = Self::try_acquire(root)? {
                return Ok(lock);
            }
            std::thread::sleep(poll_interval);
        }

        Err(RollpointError::LockTimeout(format!(
            "gave up waiting for lock after {:?}",
            start.elapsed()
        )))
    }

    /// Check lock status without acquiring
    pub fn status(root: &Path) -> Result<Option<LockHolder>> {
        let lock_path = root.join(Self::LOCK_FILENAME);
        if !lock_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&lock_path)?;
        if content.is_empty() {
            return Ok(None);
        }

        let holder: LockHolder = serde_json::from_str(&content)
            .map_err(|e| RollpointError::LockFailed(format!("parse lock holder: {e}")))?;

        // Check if the holder process is still alive using /proc on Linux;
        // elsewhere the OS-level flock is the real arbiter.
        #[cfg(target_os = "linux")]
        {
            let proc_path = format!("/proc/{}", holder.pid);
            if !Path::new(&proc_path).exists() {
                return Ok(None);
            }
        }

        Ok(Some(holder))
    }

    fn open_lock_file(lock_path: &Path) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| RollpointError::LockFailed(format!("open lock file: {e}")))
    }

    fn write_holder(lock_path: &Path) {
        let holder = LockHolder {
            pid: std::process::id(),
            acquired_at: Utc::now(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
        };
        let holder_json = serde_json::to_string(&holder).unwrap_or_default();
        fs::write(lock_path, holder_json).ok();
    }
}

impl Drop for GlobalLock {
    fn drop(&mut self) {
        if let Err(e) = self.lock_file.unlock() {
            warn!("Failed to release lock: {}", e);
        }
        debug!("Released global lock");
    }
}

/// Information about the current lock holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockHolder {
    /// Process ID holding the lock
    pub pid: u32,
    /// When the lock was acquired
    pub acquired_at: DateTime<Utc>,
    /// Hostname of the lock holder
    pub hostname: String,
}
