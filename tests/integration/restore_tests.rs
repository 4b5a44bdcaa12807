use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::fixture::{TestFixture, order_entry, ts};

use rollpoint::audit::NullAuditSink;
use rollpoint::backup::{BackupManager, digest_file};
use rollpoint::registry::{CreateRecoveryPoint, RecoveryPointRegistry};
use rollpoint::restore::{ReplayRegistry, RestoreOptions, Restorer};
use rollpoint::store::{ConnectionManager, SqliteConnectionManager};
use rollpoint::txlog::{LogQuery, TransactionLogStore};
use rollpoint::{Result, RollpointError};

#[test]
fn restore_to_point_without_backup_is_refused_without_touching_the_file() {
    let fixture = TestFixture::new();
    let service = fixture.service();

    let point = service
        .create_recovery_point(CreateRecoveryPoint::default())
        .data
        .unwrap();
    let digest_before = fixture.live_digest();
    let mtime_before = std::fs::metadata(fixture.live_path()).unwrap().modified().unwrap();

    let restored = service.restore(
        point.id,
        &RestoreOptions {
            create_backup_before_restore: false,
            user_id: None,
        },
    );

    assert!(!restored.success);
    let error = restored.error.unwrap();
    assert_eq!(error.numeric_code, 102, "NO_BACKUP_AVAILABLE");

    assert_eq!(fixture.live_digest(), digest_before);
    let mtime_after = std::fs::metadata(fixture.live_path()).unwrap().modified().unwrap();
    assert_eq!(mtime_after, mtime_before);
}

#[test]
fn restore_reports_count_of_entries_at_or_before_the_point() {
    let fixture = TestFixture::new();
    let service = fixture.service();

    // Three entries at t1 < t2 < t3
    for (record, at) in [(1, 1_000), (2, 2_000), (3, 3_000)] {
        service.transaction_log().record(order_entry(record, at)).unwrap();
    }

    // Point at t2, with backup
    let point = service
        .create_recovery_point(CreateRecoveryPoint {
            timestamp: Some(ts(2_000)),
            create_backup: true,
            ..CreateRecoveryPoint::default()
        })
        .data
        .unwrap();

    let restored = service.restore(point.id, &RestoreOptions::default());
    assert!(restored.success, "restore failed: {:?}", restored.error);
    let outcome = restored.data.unwrap();

    assert_eq!(outcome.restored_timestamp, ts(2_000));
    assert_eq!(outcome.records_restored, 2, "entries at t1 and t2");
    assert!(outcome.probe_passed);

    // The pre-restore safety snapshot exists in its own area
    let pre_path = PathBuf::from(outcome.pre_restore_backup.unwrap());
    assert!(pre_path.starts_with(fixture.root().join("backups/pre_restore")));
    assert!(pre_path.exists());
}

#[test]
fn corrupted_backup_fails_verification_and_blocks_restore() {
    let fixture = TestFixture::new();
    let service = fixture.service();

    let point = service
        .create_recovery_point(CreateRecoveryPoint {
            create_backup: true,
            ..CreateRecoveryPoint::default()
        })
        .data
        .unwrap();

    // Corrupt the backup with a single byte flip
    let backup_path = point.backup_path.clone().unwrap();
    let mut bytes = std::fs::read(&backup_path).unwrap();
    bytes[0] ^= 0x01;
    std::fs::write(&backup_path, &bytes).unwrap();

    let report = service.verify_recovery_point(point.id).data.unwrap();
    assert!(!report.valid);
    assert!(report.message.contains("mismatch"));

    let digest_before = fixture.live_digest();
    let restored = service.restore(
        point.id,
        &RestoreOptions {
            create_backup_before_restore: false,
            user_id: None,
        },
    );

    assert!(!restored.success);
    assert_eq!(restored.error.unwrap().numeric_code, 301, "INTEGRITY_CHECK_FAILED");
    assert_eq!(fixture.live_digest(), digest_before, "live file untouched");
}

/// Delegates to the real manager but fails reconnect a fixed number of
/// times, forcing a failure after the swap has committed.
struct FlakyReconnect {
    inner: Arc<SqliteConnectionManager>,
    remaining_failures: AtomicUsize,
}

impl ConnectionManager for FlakyReconnect {
    fn disconnect(&self) -> Result<()> {
        self.inner.disconnect()
    }

    fn reconnect(&self) -> Result<()> {
        if self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RollpointError::Config("injected reconnect failure".into()));
        }
        self.inner.reconnect()
    }

    fn datastore_path(&self) -> PathBuf {
        self.inner.datastore_path()
    }

    fn probe(&self, critical_tables: &[String]) -> Result<()> {
        self.inner.probe(critical_tables)
    }
}

#[test]
fn injected_failure_after_swap_rolls_back_to_pre_restore_content() {
    let fixture = TestFixture::new();
    let live_path = fixture.live_path();

    let mgr = SqliteConnectionManager::connect(&live_path).unwrap();
    let txlog = Arc::new(TransactionLogStore::new(Arc::clone(&mgr)));
    let backup = Arc::new(BackupManager::new(
        &live_path,
        fixture.root().join("backups/snapshots"),
        fixture.root().join("backups/pre_restore"),
    ));
    let registry = Arc::new(RecoveryPointRegistry::new(
        Arc::clone(&mgr),
        Arc::clone(&txlog),
        Arc::clone(&backup),
    ));

    // State A, snapshotted
    txlog.record(order_entry(1, 1_000)).unwrap();
    let point = registry
        .create(CreateRecoveryPoint {
            create_backup: true,
            ..CreateRecoveryPoint::default()
        })
        .unwrap();

    // State B, produced after the snapshot
    txlog.record(order_entry(2, 9_000)).unwrap();

    let flaky: Arc<dyn ConnectionManager> = Arc::new(FlakyReconnect {
        inner: Arc::clone(&mgr),
        remaining_failures: AtomicUsize::new(1),
    });
    let restorer = Restorer::new(
        flaky,
        Arc::clone(&registry),
        Arc::clone(&txlog),
        backup,
        Arc::new(ReplayRegistry::new()),
        Arc::new(NullAuditSink),
        vec!["transaction_log".to_string()],
    );

    let err = restorer
        .restore(point.id, &RestoreOptions::default())
        .unwrap_err();

    // The original failure is surfaced, not a rollback error
    match &err {
        RollpointError::RestoreFailed {
            step,
            reason,
            pre_restore_backup,
            rolled_back,
        } => {
            assert_eq!(step, "reconnect");
            assert!(reason.contains("injected reconnect failure"));
            assert!(*rolled_back);

            // Live bytes are back to the pre-restore state
            let pre = pre_restore_backup.as_ref().unwrap();
            assert_eq!(
                digest_file(&live_path).unwrap(),
                digest_file(Path::new(pre)).unwrap()
            );
        }
        other => panic!("expected RestoreFailed, got {other}"),
    }

    // State B survived the failed restore
    let total = txlog.query(&LogQuery::default()).unwrap().total;
    assert_eq!(total, 2);
}
