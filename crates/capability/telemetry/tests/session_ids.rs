use mbpoll_telemetry::{endpoint_statistics, new_session_id};

#[test]
fn session_ids_are_unique() {
    let a = new_session_id();
    let b = new_session_id();
    assert!(!a.is_empty());
    assert_ne!(a, b);
}

#[test]
fn global_endpoint_statistics_shared() {
    endpoint_statistics().record("test-endpoint-shared", 4, 6);
    let totals = endpoint_statistics().get("test-endpoint-shared");
    assert!(totals.transactions >= 1);
    assert!(totals.sent_bytes >= 4);
}
