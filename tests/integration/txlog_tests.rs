use crate::fixture::{TestFixture, order_entry, ts};

use rollpoint::txlog::{LogOperation, LogQuery, NewLogEntry};
use serde_json::json;

#[test]
fn entries_up_to_is_a_prefix_of_later_windows() {
    let fixture = TestFixture::new();
    let service = fixture.service();
    let log = service.transaction_log();

    // Deliberately out of submission order; the store orders by timestamp.
    for (record, at) in [(3, 3_000), (1, 1_000), (2, 2_000)] {
        log.record(order_entry(record, at)).unwrap();
    }

    let narrow = log.entries_up_to(ts(2_000)).unwrap();
    let wide = log.entries_up_to(ts(3_000)).unwrap();

    assert_eq!(narrow.len(), 2);
    assert_eq!(wide.len(), 3);
    for (a, b) in narrow.iter().zip(wide.iter()) {
        assert_eq!(a.id, b.id, "earlier window must be a prefix");
    }
    assert!(
        narrow.windows(2).all(|w| w[0].timestamp <= w[1].timestamp),
        "replay order is oldest-first"
    );

    let after = log.entries_after(ts(2_000)).unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].timestamp, ts(3_000));
}

#[test]
fn query_envelope_reports_pages_newest_first() {
    let fixture = TestFixture::new();
    let service = fixture.service();

    for record in 0..7 {
        service
            .transaction_log()
            .record(order_entry(record, 1_000 + record))
            .unwrap();
    }

    let envelope = service.query_log(&LogQuery {
        table_name: Some("orders".to_string()),
        page: 2,
        page_size: 3,
        ..LogQuery::default()
    });
    assert!(envelope.success);
    let page = envelope.data.unwrap();
    assert_eq!(page.total, 7);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.entries.len(), 3);
    // Page 2 of newest-first: 7 entries, page 1 covers the 3 newest.
    assert_eq!(page.entries[0].timestamp, ts(1_003));
}

#[test]
fn prune_only_touches_old_unpinned_entries() {
    let fixture = TestFixture::new();
    let service = fixture.service();
    let log = service.transaction_log();

    let old = chrono::Utc::now() - chrono::Duration::days(45);
    log.record(NewLogEntry::create("orders", Some(1), json!({})).at(old))
        .unwrap();
    log.record(NewLogEntry::create("orders", Some(2), json!({})))
        .unwrap();

    // Creating a recovery point after the old entry pins it.
    let created = service.create_recovery_point(rollpoint::registry::CreateRecoveryPoint {
        timestamp: Some(old + chrono::Duration::minutes(1)),
        ..rollpoint::registry::CreateRecoveryPoint::default()
    });
    assert!(created.success);

    let pruned = service.prune_log(Some(30));
    assert!(pruned.success);
    assert_eq!(pruned.data.unwrap().deleted, 0, "pinned entry survives");

    // Deleting the point unpins; the old entry is now reclaimable.
    let point_id = {
        let listed = service.list_recovery_points(&rollpoint::registry::RecoveryPointFilter::default());
        listed.data.unwrap().points[0].id
    };
    assert!(service.delete_recovery_point(point_id).success);

    let pruned = service.prune_log(Some(30));
    assert_eq!(pruned.data.unwrap().deleted, 1);

    let remaining = service.query_log(&LogQuery::default()).data.unwrap();
    assert_eq!(remaining.total, 1);
    assert_eq!(remaining.entries[0].record_id, Some(2));
}

#[test]
fn batch_append_is_idempotent_across_retries() {
    let fixture = TestFixture::new();
    let service = fixture.service();

    let batch = vec![
        order_entry(1, 1_000),
        order_entry(2, 2_000),
        NewLogEntry::delete("orders", Some(1), json!({"record": 1})).at(ts(3_000)),
    ];

    service.append_batch(batch.clone());
    service.append_batch(batch);

    let page = service.query_log(&LogQuery::default()).data.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.entries[0].operation, LogOperation::Delete);
}
