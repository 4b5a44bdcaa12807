//! Datastore connection lifecycle.
//!
//! The restore protocol needs to release the live handle before the file
//! swap and reopen it afterwards. That lifecycle is a trait so tests can
//! substitute a fake, instead of the restorer reaching into ambient global
//! state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::{Result, RollpointError};
use crate::store::sqlite::{table_row_count, Database};

/// Exclusive lifecycle contract for the live datastore handle.
///
/// Not re-entrant during restore: the caller guarantees no concurrent
/// mutation runs between `disconnect` and `reconnect`.
pub trait ConnectionManager: Send + Sync {
    /// Release the live handle so the datastore file can be replaced.
    fn disconnect(&self) -> Result<()>;

    /// Re-open the datastore after a swap. Idempotent.
    fn reconnect(&self) -> Result<()>;

    /// Path of the live datastore file.
    fn datastore_path(&self) -> PathBuf;

    /// Lightweight consistency probe: datastore reachable and the given
    /// critical tables queryable.
    fn probe(&self, critical_tables: &[String]) -> Result<()>;
}

/// [`ConnectionManager`] over a real SQLite file, also serving as the
/// query surface for the log store and the registry.
pub struct SqliteConnectionManager {
    path: PathBuf,
    db: Mutex<Option<Database>>,
}

impl SqliteConnectionManager {
    /// Open the datastore at `path` (creating it if needed) and return a
    /// connected manager.
    pub fn connect(path: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let path = path.into();
        let db = Database::open(&path)?;
        Ok(Arc::new(Self {
            path,
            db: Mutex::new(Some(db)),
        }))
    }

    /// Run `f` against the live connection.
    ///
    /// Fails with [`RollpointError::DatastoreDisconnected`] while the
    /// handle is released during a restore.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.db.lock();
        let db = guard
            .as_ref()
            .ok_or(RollpointError::DatastoreDisconnected)?;
        f(db.conn())
    }

    /// Whether a live handle is currently open.
    pub fn is_connected(&self) -> bool {
        self.db.lock().is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for SqliteConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnectionManager")
            .field("path", &self.path)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl ConnectionManager for SqliteConnectionManager {
    fn disconnect(&self) -> Result<()> {
        // Dropping the Database closes the underlying handle.
        *self.db.lock() = None;
        Ok(())
    }

    fn reconnect(&self) -> Result<()> {
        let mut guard = self.db.lock();
        if guard.is_none() {
            *guard = Some(Database::open(&self.path)?);
        }
        Ok(())
    }

    fn datastore_path(&self) -> PathBuf {
        self.path.clone()
    }

    fn probe(&self, critical_tables: &[String]) -> Result<()> {
        self.with_conn(|conn| {
            for table in critical_tables {
                table_row_count(conn, table)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_then_query_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SqliteConnectionManager::connect(dir.path().join("store.db")).unwrap();

        assert!(mgr.is_connected());
        mgr.disconnect().unwrap();
        assert!(!mgr.is_connected());

        let err = mgr.with_conn(|_| Ok(())).unwrap_err();
        assert!(matches!(err, RollpointError::DatastoreDisconnected));
    }

    #[test]
    fn reconnect_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SqliteConnectionManager::connect(dir.path().join("store.db")).unwrap();

        mgr.reconnect().unwrap();
        mgr.disconnect().unwrap();
        mgr.reconnect().unwrap();
        mgr.reconnect().unwrap();
        assert!(mgr.is_connected());
    }

    #[test]
    fn probe_checks_critical_tables() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SqliteConnectionManager::connect(dir.path().join("store.db")).unwrap();

        let ok_tables = vec!["transaction_log".to_string(), "recovery_points".to_string()];
        mgr.probe(&ok_tables).unwrap();

        let bad_tables = vec!["missing_table".to_string()];
        assert!(mgr.probe(&bad_tables).is_err());
    }
}
