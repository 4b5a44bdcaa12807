use crate::fixture::{TestFixture, order_entry};

use rollpoint::registry::CreateRecoveryPoint;
use rollpoint::txlog::LogQuery;

#[test]
fn every_boundary_operation_returns_an_envelope() {
    let fixture = TestFixture::new();
    let service = fixture.service();

    // Failures come back as {success: false, error} with a machine code,
    // never as a panic or a raw Err.
    let missing = service.get_recovery_point(9_999);
    assert!(!missing.success);
    let error = missing.error.unwrap();
    assert_eq!(error.numeric_code, 101);
    assert_eq!(error.category, "recovery_point");
    assert!(error.recoverable);

    let bad_delete = service.delete_recovery_point(9_999);
    assert!(!bad_delete.success);

    let bad_verify = service.verify_recovery_point(9_999);
    assert!(!bad_verify.success);

    let bad_restore = service.restore(9_999, &rollpoint::restore::RestoreOptions::default());
    assert!(!bad_restore.success);

    // Successes carry data and omit the error
    let ok = service.query_log(&LogQuery::default());
    assert!(ok.success);
    assert!(ok.error.is_none());
    assert!(ok.data.is_some());
}

#[test]
fn envelopes_serialize_with_success_flag() {
    let fixture = TestFixture::new();
    let service = fixture.service();

    let created = service.create_recovery_point(CreateRecoveryPoint {
        name: Some("serialized".into()),
        ..CreateRecoveryPoint::default()
    });
    let json = serde_json::to_value(&created).unwrap();
    assert_eq!(json["success"], serde_json::Value::Bool(true));
    assert_eq!(json["data"]["name"], "serialized");
    assert!(json.get("error").is_none());

    let missing = service.get_recovery_point(77);
    let json = serde_json::to_value(&missing).unwrap();
    assert_eq!(json["success"], serde_json::Value::Bool(false));
    assert_eq!(json["error"]["code"], "RECOVERY_POINT_NOT_FOUND");
}

#[test]
fn fire_and_forget_appends_survive_a_full_service_cycle() {
    let fixture = TestFixture::new();

    {
        let service = fixture.service();
        for record in 0..20 {
            service.append(order_entry(record, 1_000 + record));
        }
        service.shutdown();
    }

    let service = fixture.service();
    let page = service.query_log(&LogQuery::default()).data.unwrap();
    assert_eq!(page.total, 20);
}

#[test]
fn restores_survive_reopening_the_service() {
    let fixture = TestFixture::new();

    let point_id = {
        let service = fixture.service();
        service.transaction_log().record(order_entry(1, 1_000)).unwrap();
        let point = service
            .create_recovery_point(CreateRecoveryPoint {
                create_backup: true,
                ..CreateRecoveryPoint::default()
            })
            .data
            .unwrap();
        service.shutdown();
        point.id
    };

    let service = fixture.service();
    let restored = service.restore(point_id, &rollpoint::restore::RestoreOptions::default());
    assert!(restored.success, "restore failed: {:?}", restored.error);
    assert_eq!(restored.data.unwrap().records_restored, 1);
}
