use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use serde_json::json;

use rollpoint::registry::{CreateRecoveryPoint, RecoveryPointRegistry};
use rollpoint::backup::BackupManager;
use rollpoint::store::SqliteConnectionManager;
use rollpoint::txlog::{LogOperation, NewLogEntry, TransactionLogStore};

fn arb_operation() -> impl Strategy<Value = LogOperation> {
    prop_oneof![
        Just(LogOperation::Create),
        Just(LogOperation::Update),
        Just(LogOperation::Delete),
    ]
}

#[derive(Debug, Clone)]
struct ArbEntry {
    table: String,
    record_id: i64,
    operation: LogOperation,
    offset_ms: i64,
}

fn arb_entry() -> impl Strategy<Value = ArbEntry> {
    (
        prop_oneof![Just("orders"), Just("products"), Just("pricing")],
        0i64..50,
        arb_operation(),
        0i64..100_000,
    )
        .prop_map(|(table, record_id, operation, offset_ms)| ArbEntry {
            table: table.to_string(),
            record_id,
            operation,
            offset_ms,
        })
}

fn store_in(dir: &tempfile::TempDir) -> TransactionLogStore {
    let mgr = SqliteConnectionManager::connect(dir.path().join("store.db")).unwrap();
    TransactionLogStore::new(mgr)
}

fn base_ts() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_000_000).unwrap()
}

fn insert_all(store: &TransactionLogStore, entries: &[ArbEntry]) {
    for entry in entries {
        let ts = base_ts() + Duration::milliseconds(entry.offset_ms);
        let new_entry = NewLogEntry {
            table_name: entry.table.clone(),
            record_id: Some(entry.record_id),
            operation: entry.operation,
            user_id: None,
            before_image: None,
            after_image: Some(json!({ "record": entry.record_id })),
            timestamp: Some(ts),
        };
        store.record(new_entry).unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// entries_up_to(t) returns exactly the subset with timestamp <= t,
    /// oldest-first, and is a prefix of entries_up_to(t') for t' >= t.
    #[test]
    fn entries_up_to_is_an_ordered_prefix(
        entries in prop::collection::vec(arb_entry(), 1..40),
        cut_a in 0i64..100_000,
        cut_b in 0i64..100_000,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        insert_all(&store, &entries);

        let (lo, hi) = if cut_a <= cut_b { (cut_a, cut_b) } else { (cut_b, cut_a) };
        let ts_lo = base_ts() + Duration::milliseconds(lo);
        let ts_hi = base_ts() + Duration::milliseconds(hi);

        let narrow = store.entries_up_to(ts_lo).unwrap();
        let wide = store.entries_up_to(ts_hi).unwrap();

        // Exact subset by timestamp
        prop_assert!(narrow.iter().all(|e| e.timestamp <= ts_lo));
        let expected = wide.iter().filter(|e| e.timestamp <= ts_lo).count();
        prop_assert_eq!(narrow.len(), expected);

        // Oldest-first ordering
        prop_assert!(narrow.windows(2).all(|w| (w[0].timestamp, w[0].id) <= (w[1].timestamp, w[1].id)));

        // Prefix property
        for (a, b) in narrow.iter().zip(wide.iter()) {
            prop_assert_eq!(a.id, b.id);
        }

        // Complement: up_to(t) + after(t) covers everything exactly once
        let after = store.entries_after(ts_hi).unwrap();
        let total = store.entries_up_to(ts_hi).unwrap().len() + after.len();
        let everything = store
            .entries_up_to(base_ts() + Duration::milliseconds(200_000))
            .unwrap();
        prop_assert_eq!(total, everything.len());
    }

    /// Pruning never deletes a pinned entry, regardless of age.
    #[test]
    fn prune_never_deletes_pinned_entries(
        entries in prop::collection::vec(arb_entry(), 1..30),
        pin_offset in 0i64..100_000,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SqliteConnectionManager::connect(dir.path().join("store.db")).unwrap();
        let store = Arc::new(TransactionLogStore::new(Arc::clone(&mgr)));

        // Entries backdated far beyond any retention window
        let old_base = Utc::now() - Duration::days(365);
        for entry in &entries {
            let new_entry = NewLogEntry {
                table_name: entry.table.clone(),
                record_id: Some(entry.record_id),
                operation: entry.operation,
                user_id: None,
                before_image: None,
                after_image: None,
                timestamp: Some(old_base + Duration::milliseconds(entry.offset_ms)),
            };
            store.record(new_entry).unwrap();
        }

        // A recovery point pins everything at or before its timestamp
        let backup = Arc::new(BackupManager::new(
            dir.path().join("store.db"),
            dir.path().join("backups/snapshots"),
            dir.path().join("backups/pre_restore"),
        ));
        let registry = RecoveryPointRegistry::new(
            Arc::clone(&mgr),
            Arc::clone(&store),
            backup,
        );
        let point_ts = old_base + Duration::milliseconds(pin_offset);
        registry
            .create(CreateRecoveryPoint {
                timestamp: Some(point_ts),
                ..CreateRecoveryPoint::default()
            })
            .unwrap();

        let before = store
            .entries_up_to(Utc::now())
            .unwrap();
        let pinned_before = before.iter().filter(|e| e.recovery_point_id.is_some()).count();

        store.prune_older_than(30).unwrap();

        let after = store.entries_up_to(Utc::now()).unwrap();
        // Every pinned entry survived
        prop_assert_eq!(
            after.iter().filter(|e| e.recovery_point_id.is_some()).count(),
            pinned_before
        );
        // Everything that survived is pinned (all rows were over-age)
        prop_assert!(after.iter().all(|e| e.recovery_point_id.is_some()));
    }
}
