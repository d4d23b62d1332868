//! Missing-instrumentation gap markers.

use tracelens::model::Policy;
use tracelens::tree::{
    detect_missing_instrumentation, remove_missing_instrumentation, NodeValue,
};

use crate::{build, span_json, spans_event, trace_payload, txn_json};

fn tree_with_gap(sdk: Option<&str>) -> (tracelens::tree::TraceTree, tracelens::tree::NodeId) {
    let payload = trace_payload(vec![txn_json("t1", "p", "http.server", "/", 0.0, 3.0)], vec![]);
    let mut tree = build(&payload);
    let txn = tree.children_of(tree.trace_root())[0];
    // Two seconds of nothing between the spans.
    let event = spans_event(
        sdk,
        vec![
            span_json("a", "db", "q1", 0.0, 0.1),
            span_json("b", "db", "q2", 2.3, 2.4),
        ],
    );
    tree.apply_span_event(txn, &event, &Policy::default()).unwrap();
    (tree, txn)
}

#[test]
fn a_two_second_gap_gets_exactly_one_marker() {
    let (tree, txn) = tree_with_gap(Some("sentry.python"));

    let span_view = tree.children_of(txn);
    assert_eq!(span_view.len(), 3);
    match tree.node(span_view[1]).value {
        NodeValue::MissingInstrumentation { gap_ms, .. } => {
            assert!((gap_ms - 2200.0).abs() < 1e-6);
        }
        ref other => panic!("expected gap marker, got {}", other.kind()),
    }
    // The marker renders as a row of its own.
    assert!(tree.list().contains(&span_view[1]));
}

#[test]
fn removal_restores_adjacency_byte_for_byte() {
    let (mut tree, _txn) = tree_with_gap(Some("sentry.python"));
    let with_marker = tree.snapshot();

    remove_missing_instrumentation(&mut tree);
    let without_marker = tree.snapshot();
    assert_ne!(with_marker, without_marker);

    // Re-detecting puts the marker back in exactly the same place.
    detect_missing_instrumentation(&mut tree, &Policy::default());
    assert_eq!(tree.snapshot(), with_marker);
}

#[test]
fn browser_sdks_are_exempt_from_gap_detection() {
    let (tree, txn) = tree_with_gap(Some("sentry.javascript.browser"));
    assert_eq!(tree.children_of(txn).len(), 2);
}

#[test]
fn detection_is_idempotent() {
    let (mut tree, _txn) = tree_with_gap(Some("sentry.python"));
    let before = tree.snapshot();
    detect_missing_instrumentation(&mut tree, &Policy::default());
    assert_eq!(tree.snapshot(), before);
}

#[test]
fn markers_never_stack() {
    let (mut tree, txn) = tree_with_gap(Some("sentry.python"));
    detect_missing_instrumentation(&mut tree, &Policy::default());
    detect_missing_instrumentation(&mut tree, &Policy::default());

    let markers = tree
        .children_of(txn)
        .into_iter()
        .filter(|&id| matches!(tree.node(id).value, NodeValue::MissingInstrumentation { .. }))
        .count();
    assert_eq!(markers, 1);
}
