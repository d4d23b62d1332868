//! Zoom-in/zoom-out orchestration: lazy fetch, dedup, staleness.

use parking_lot::Mutex;
use tracelens::fetch::{FetchError, ZoomController};
use tracelens::model::{EventPayload, Policy};
use tracelens::tree::{FetchStatus, NodeId, NodeValue, TraceTree};

use crate::{build, span_json, spans_event, trace_payload, txn_json, MockApi};

fn fixture() -> (Mutex<TraceTree>, NodeId) {
    let payload = trace_payload(
        vec![txn_json("t1", "frontend", "http.server", "/", 0.0, 1.0)],
        vec![],
    );
    let tree = build(&payload);
    let txn = tree.children_of(tree.trace_root())[0];
    (Mutex::new(tree), txn)
}

fn controller(api: std::sync::Arc<MockApi>) -> ZoomController {
    ZoomController::new(api, "acme".into(), Policy::default())
}

#[tokio::test]
async fn zoom_in_fetches_and_splices_spans() {
    let api = MockApi::new();
    api.stage_spans(
        "t1",
        spans_event(None, vec![span_json("a", "db", "q1", 0.1, 0.2), span_json("b", "http.client", "GET", 0.3, 0.4)]),
    );
    let (tree, txn) = fixture();
    let zoom = controller(api.clone());

    let changed = zoom.zoom_in(&tree, txn, true).await.unwrap();
    assert!(changed);
    assert_eq!(api.span_calls("t1"), 1);

    let guard = tree.lock();
    assert!(guard.node(txn).zoomed_in);
    assert_eq!(guard.node(txn).fetch_status, FetchStatus::Resolved);
    // Trace row, transaction, two spans.
    assert_eq!(guard.list().len(), 4);
}

#[tokio::test]
async fn zoom_round_trip_reuses_the_fetched_subtree() {
    let api = MockApi::new();
    api.stage_spans("t1", spans_event(None, vec![span_json("a", "db", "q1", 0.1, 0.2)]));
    let (tree, txn) = fixture();
    let zoom = controller(api.clone());

    zoom.zoom_in(&tree, txn, true).await.unwrap();
    let zoomed_rows = tree.lock().list().to_vec();

    zoom.zoom_in(&tree, txn, false).await.unwrap();
    assert_eq!(tree.lock().list().len(), 2);

    zoom.zoom_in(&tree, txn, true).await.unwrap();
    assert_eq!(tree.lock().list().to_vec(), zoomed_rows);
    // The second zoom-in is served from the kept subtree.
    assert_eq!(api.span_calls("t1"), 1);
}

#[tokio::test]
async fn concurrent_zooms_share_one_request() {
    let api = MockApi::new();
    api.stage_spans("t1", spans_event(None, vec![span_json("a", "db", "q1", 0.1, 0.2)]));
    let (tree, txn) = fixture();
    let zoom = controller(api.clone());

    let (first, second) = futures::join!(zoom.zoom_in(&tree, txn, true), zoom.zoom_in(&tree, txn, true));
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(api.span_calls("t1"), 1);
    assert_eq!(zoom.cache().in_flight(), 0);
}

#[tokio::test]
async fn failed_fetch_marks_the_node_and_leaves_the_tree_alone() {
    let api = MockApi::new();
    api.fail_spans("t1", "500 internal server error");
    let (tree, txn) = fixture();
    let zoom = controller(api.clone());

    let rows_before = tree.lock().list().to_vec();
    let result = zoom.zoom_in(&tree, txn, true).await;
    assert!(matches!(result, Err(FetchError::Api(_))));

    let guard = tree.lock();
    assert_eq!(guard.node(txn).fetch_status, FetchStatus::Error);
    assert!(!guard.node(txn).zoomed_in);
    assert_eq!(guard.list().to_vec(), rows_before);
}

#[tokio::test]
async fn empty_span_payload_keeps_nested_transactions_visible() {
    let api = MockApi::new();
    api.stage_spans("t1", spans_event(None, vec![]));

    let mut root = txn_json("t1", "frontend", "http.server", "/", 0.0, 1.0);
    root["children"] =
        serde_json::json!([txn_json("t2", "backend", "http.server", "/api", 0.2, 0.8)]);
    let tree = build(&trace_payload(vec![root], vec![]));
    let txn = tree.children_of(tree.trace_root())[0];
    let tree = Mutex::new(tree);
    let zoom = controller(api.clone());

    let rows_before = tree.lock().list().len();
    zoom.zoom_in(&tree, txn, true).await.unwrap();

    let guard = tree.lock();
    assert!(guard.node(txn).zoomed_in);
    assert_eq!(guard.node(txn).fetch_status, FetchStatus::Resolved);
    // The nested transaction re-attaches in the span view instead of
    // vanishing from the list.
    assert_eq!(guard.list().len(), rows_before);
    let nested = guard.children_of(txn);
    assert_eq!(nested.len(), 1);
    match &guard.node(nested[0]).value {
        NodeValue::Transaction(t) => assert_eq!(t.event_id.as_str(), "t2"),
        other => panic!("expected the nested transaction, got {}", other.kind()),
    }
}

#[tokio::test]
async fn payload_without_spans_marks_the_node_error() {
    let api = MockApi::new();
    let broken: EventPayload =
        serde_json::from_value(serde_json::json!({"entries": [], "sdk_name": null})).unwrap();
    api.stage_spans("t1", broken);
    let (tree, txn) = fixture();
    let zoom = controller(api.clone());

    let result = zoom.zoom_in(&tree, txn, true).await;
    assert!(matches!(result, Err(FetchError::Payload(_))));
    {
        let guard = tree.lock();
        assert_eq!(guard.node(txn).fetch_status, FetchStatus::Error);
        assert!(!guard.node(txn).zoomed_in);
    }

    // `Error` is the retry affordance: a fixed payload fetches again.
    api.stage_spans("t1", spans_event(None, vec![span_json("a", "db", "q1", 0.1, 0.2)]));
    assert!(zoom.zoom_in(&tree, txn, true).await.unwrap());
    assert_eq!(api.span_calls("t1"), 2);
}

#[tokio::test]
async fn manual_retry_after_failure_fetches_again() {
    let api = MockApi::new();
    api.fail_spans("t1", "503");
    let (tree, txn) = fixture();
    let zoom = controller(api.clone());

    assert!(zoom.zoom_in(&tree, txn, true).await.is_err());
    assert_eq!(api.span_calls("t1"), 1);

    api.stage_spans("t1", spans_event(None, vec![span_json("a", "db", "q1", 0.1, 0.2)]));
    assert!(zoom.zoom_in(&tree, txn, true).await.unwrap());
    assert_eq!(api.span_calls("t1"), 2);
    assert_eq!(tree.lock().node(txn).fetch_status, FetchStatus::Resolved);
}

#[tokio::test]
async fn zoom_widens_bounds_and_fires_timeline_change() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let api = MockApi::new();
    // A span ending after the transaction's own envelope.
    api.stage_spans("t1", spans_event(None, vec![span_json("a", "db", "q1", 0.5, 5.0)]));
    let (tree, txn) = fixture();
    let fired = Arc::new(AtomicUsize::new(0));
    {
        let fired = Arc::clone(&fired);
        tree.lock().on_timeline_change(move |_| {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }
    let zoom = controller(api.clone());

    let before = tree.lock().space();
    zoom.zoom_in(&tree, txn, true).await.unwrap();
    let after = tree.lock().space();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(after.end() >= before.end());
    assert_eq!(after.end(), 5000.0);
}
