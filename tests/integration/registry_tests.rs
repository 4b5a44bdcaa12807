use std::path::Path;

use crate::fixture::{TestFixture, order_entry};

use rollpoint::backup::digest_file;
use rollpoint::registry::{CreateRecoveryPoint, RecoveryPointFilter};

#[test]
fn snapshot_roundtrip_then_byte_flip_fails_verification() {
    let fixture = TestFixture::new();
    let service = fixture.service();

    let created = service.create_recovery_point(CreateRecoveryPoint {
        name: Some("nightly".into()),
        create_backup: true,
        ..CreateRecoveryPoint::default()
    });
    assert!(created.success);
    let point = created.data.unwrap();

    // Snapshot immediately verifies
    let verified = service.verify_recovery_point(point.id);
    assert!(verified.data.unwrap().valid);

    // Flip one byte of the backup; verification must fail with a
    // checksum mismatch.
    let backup_path = point.backup_path.unwrap();
    let mut bytes = std::fs::read(&backup_path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x01;
    std::fs::write(&backup_path, &bytes).unwrap();

    let report = service.verify_recovery_point(point.id).data.unwrap();
    assert!(!report.valid);
    assert!(report.message.contains("mismatch"));
}

#[test]
fn delete_removes_backup_file_and_forgets_the_point() {
    let fixture = TestFixture::new();
    let service = fixture.service();

    let point = service
        .create_recovery_point(CreateRecoveryPoint {
            create_backup: true,
            ..CreateRecoveryPoint::default()
        })
        .data
        .unwrap();
    let backup_path = point.backup_path.clone().unwrap();
    assert!(Path::new(&backup_path).exists());

    let deleted = service.delete_recovery_point(point.id);
    assert!(deleted.success);
    assert!(deleted.data.unwrap().backup_removed);
    assert!(!Path::new(&backup_path).exists());

    let gone = service.get_recovery_point(point.id);
    assert!(!gone.success);
    assert_eq!(gone.error.unwrap().numeric_code, 101);
}

#[test]
fn create_without_backup_makes_no_snapshot() {
    let fixture = TestFixture::new();
    let service = fixture.service();

    let point = service
        .create_recovery_point(CreateRecoveryPoint::default())
        .data
        .unwrap();
    assert!(point.backup_path.is_none());
    assert!(point.checksum.is_none());

    // No snapshot directory contents
    let snapshots = fixture.root().join("backups/snapshots");
    let count = snapshots
        .read_dir()
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(count, 0);
}

#[test]
fn backup_checksum_matches_file_digest_at_creation() {
    let fixture = TestFixture::new();
    let service = fixture.service();
    service
        .transaction_log()
        .record(order_entry(1, 1_000))
        .unwrap();

    let point = service
        .create_recovery_point(CreateRecoveryPoint {
            create_backup: true,
            ..CreateRecoveryPoint::default()
        })
        .data
        .unwrap();

    let recomputed = digest_file(Path::new(point.backup_path.as_ref().unwrap())).unwrap();
    assert_eq!(recomputed, point.checksum.unwrap());
}

#[test]
fn list_is_newest_first_and_filterable() {
    let fixture = TestFixture::new();
    let service = fixture.service();

    for i in 0..4 {
        let created = service.create_recovery_point(CreateRecoveryPoint {
            timestamp: Some(crate::fixture::ts(10_000 + i)),
            is_automatic: i < 2,
            ..CreateRecoveryPoint::default()
        });
        assert!(created.success);
    }

    let all = service
        .list_recovery_points(&RecoveryPointFilter::default())
        .data
        .unwrap();
    assert_eq!(all.total, 4);
    assert!(all.points[0].timestamp > all.points[3].timestamp);

    let manual = service
        .list_recovery_points(&RecoveryPointFilter {
            is_automatic: Some(false),
            ..RecoveryPointFilter::default()
        })
        .data
        .unwrap();
    assert_eq!(manual.total, 2);
}
