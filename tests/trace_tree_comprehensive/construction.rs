//! Construction from raw trace payloads.

use tracelens::model::{Policy, ReplayRecord, TraceMeta, VitalKind};
use tracelens::tree::{NodeValue, ReparentReason, TraceTree, TreeStatus};

use crate::{build, trace_payload, txn_json};

#[test]
fn simple_trace_space_and_rows() {
    let mut root = txn_json("t1", "frontend", "pageload", "/", 0.0, 2.0);
    root["children"] = serde_json::json!([txn_json("t2", "backend", "http.server", "/api", 1.0, 4.0)]);
    let tree = build(&trace_payload(vec![root], vec![]));

    // Bounds cover the child's later end, in milliseconds.
    assert_eq!(tree.space().start, 0.0);
    assert_eq!(tree.space().duration, 4000.0);

    // Trace row plus both transactions.
    assert_eq!(tree.list().len(), 3);
    let trace = tree.list()[0];
    assert_eq!(trace, tree.trace_root());
    assert_eq!(tree.depth_of(trace), 0);
    assert_eq!(tree.depth_of(tree.list()[1]), 1);
    assert_eq!(tree.depth_of(tree.list()[2]), 2);
    assert_eq!(tree.status(), TreeStatus::Trace);
    assert_eq!(tree.events_count, 2);
}

#[test]
fn merge_walk_interleaves_orphan_errors_chronologically() {
    let transactions = vec![
        txn_json("t1", "p", "http.server", "/a", 0.0, 1.0),
        txn_json("t2", "p", "http.server", "/b", 5.0, 6.0),
    ];
    let orphans = vec![
        serde_json::json!({"event_id": "e1", "project_slug": "p", "title": "boom", "timestamp": 2.0}),
        // Ties on the same start go to the transaction.
        serde_json::json!({"event_id": "e2", "project_slug": "p", "title": "late", "timestamp": 5.0}),
    ];
    let tree = build(&trace_payload(transactions, orphans));

    let kinds: Vec<&str> = tree
        .children_of(tree.trace_root())
        .into_iter()
        .map(|id| tree.node(id).value.kind())
        .collect();
    assert_eq!(kinds, vec!["txn", "error", "txn", "error"]);
}

#[test]
fn orphan_errors_aggregate_on_the_trace_row() {
    let orphans = vec![serde_json::json!({
        "event_id": "e1", "project_slug": "p", "title": "boom", "timestamp": 1.0,
    })];
    let tree = build(&trace_payload(vec![], orphans));

    let trace = tree.node(tree.trace_root());
    assert!(trace.has_issues());
    assert_eq!(trace.errors.len(), 1);
    assert_eq!(tree.events_count, 1);
}

#[test]
fn embedded_errors_roll_up_without_becoming_rows() {
    let mut txn = txn_json("t1", "p", "http.server", "/a", 0.0, 1.0);
    txn["errors"] = serde_json::json!([
        {"event_id": "e1", "project_slug": "p", "title": "boom", "level": "error"}
    ]);
    let tree = build(&trace_payload(vec![txn], vec![]));

    assert_eq!(tree.list().len(), 2);
    assert_eq!(tree.node(tree.trace_root()).errors.len(), 1);
    let txn_node = tree.list()[1];
    assert_eq!(tree.node(txn_node).errors.len(), 1);
}

#[test]
fn pageload_wraps_its_server_handler() {
    let mut server = txn_json("srv", "backend", "http.server", "/page", 0.0, 2.0);
    server["children"] = serde_json::json!([txn_json("page", "frontend", "pageload", "/page", 0.1, 1.9)]);
    let tree = build(&trace_payload(vec![server], vec![]));

    let trace_children = tree.children_of(tree.trace_root());
    assert_eq!(trace_children.len(), 1);
    let pageload = trace_children[0];
    assert_eq!(tree.node(pageload).op(), Some("pageload"));

    let server_node = tree.children_of(pageload)[0];
    assert_eq!(tree.node(server_node).op(), Some("http.server"));
    assert_eq!(
        tree.node(server_node).reparent_reason,
        Some(ReparentReason::PageloadServerHandler)
    );
    // Rows render pageload above the server handler.
    assert_eq!(tree.list()[1], pageload);
    assert_eq!(tree.list()[2], server_node);
}

#[test]
fn measurements_become_sorted_indicators() {
    let mut first = txn_json("t1", "p", "pageload", "/", 1.0, 3.0);
    first["measurements"] = serde_json::json!({
        "lcp": {"value": 2500.0},
        "ttfb": {"value": 200.0},
    });
    let tree = build(&trace_payload(vec![first], vec![]));

    assert_eq!(tree.indicators.len(), 2);
    assert_eq!(tree.indicators[0].kind, VitalKind::Ttfb);
    assert_eq!(tree.indicators[0].start, 1000.0 + 200.0);
    assert_eq!(tree.indicators[1].kind, VitalKind::Lcp);
    assert_eq!(tree.indicators[1].start, 1000.0 + 2500.0);
}

#[test]
fn replay_widens_the_envelope() {
    let payload = trace_payload(vec![txn_json("t1", "p", "pageload", "/", 1.0, 2.0)], vec![]);
    let replay = ReplayRecord { started_at: 0.5, finished_at: 4.0 };
    let tree = TraceTree::from_trace(&payload, &TraceMeta::default(), Some(&replay), &Policy::default());

    assert_eq!(tree.space().start, 500.0);
    assert_eq!(tree.space().duration, 3500.0);
}

#[test]
fn span_count_hint_of_zero_disables_fetching() {
    let payload = trace_payload(
        vec![
            txn_json("t1", "p", "http.server", "/a", 0.0, 1.0),
            txn_json("t2", "p", "http.server", "/b", 1.0, 2.0),
        ],
        vec![],
    );
    let mut meta = TraceMeta::default();
    meta.transaction_child_count_map.insert("t1".to_string(), 0);
    meta.transaction_child_count_map.insert("t2".to_string(), 12);
    let tree = TraceTree::from_trace(&payload, &meta, None, &Policy::default());

    let children = tree.children_of(tree.trace_root());
    assert!(!tree.node(children[0]).can_fetch);
    assert!(tree.node(children[1]).can_fetch);
}

#[test]
fn expand_and_collapse_patch_the_list_in_place() {
    let mut root = txn_json("t1", "p", "pageload", "/", 0.0, 2.0);
    root["children"] = serde_json::json!([
        txn_json("t2", "p", "http.server", "/a", 0.5, 1.0),
        txn_json("t3", "p", "http.server", "/b", 1.0, 1.5),
    ]);
    let mut tree = build(&trace_payload(vec![root], vec![]));
    assert_eq!(tree.list().len(), 4);

    let parent = tree.list()[1];
    assert!(tree.expand(parent, false));
    assert_eq!(tree.list().len(), 2);
    // Collapsing again reports no change.
    assert!(!tree.expand(parent, false));

    assert!(tree.expand(parent, true));
    assert_eq!(tree.list().len(), 4);
}

#[test]
fn visible_count_matches_visible_children_everywhere() {
    let mut root = txn_json("t1", "p", "pageload", "/", 0.0, 2.0);
    root["children"] = serde_json::json!([
        txn_json("t2", "p", "http.server", "/a", 0.5, 1.0),
        txn_json("t3", "p", "http.server", "/b", 1.0, 1.5),
    ]);
    let mut tree = build(&trace_payload(vec![root], vec![]));

    let all: Vec<_> = tree.list().to_vec();
    for &id in &all {
        assert_eq!(tree.visible_children_count(id), tree.visible_children(id).len());
    }
    // Same invariant with a collapsed interior node.
    let parent = all[1];
    tree.expand(parent, false);
    for &id in tree.list().to_vec().iter() {
        assert_eq!(tree.visible_children_count(id), tree.visible_children(id).len());
    }
}

#[test]
fn placeholder_trees_have_lifecycle_status() {
    assert_eq!(TraceTree::empty().status(), TreeStatus::Empty);
    assert_eq!(TraceTree::loading().status(), TreeStatus::Loading);
    assert_eq!(TraceTree::error().status(), TreeStatus::Error);
    // Placeholders still render their trace row.
    assert_eq!(TraceTree::loading().list().len(), 1);
}

#[test]
fn connectors_reflect_continuing_ancestors() {
    let mut root = txn_json("t1", "p", "pageload", "/", 0.0, 2.0);
    root["children"] = serde_json::json!([txn_json("t2", "p", "http.server", "/a", 0.5, 1.0)]);
    let tree = build(&trace_payload(
        vec![root, txn_json("t3", "p", "http.server", "/b", 3.0, 4.0)],
        vec![],
    ));

    // t2 sits under t1, and t1 has a following sibling, so t2 carries a
    // connector at t1's depth.
    let t2 = tree.list()[2];
    assert!(matches!(tree.node(t2).value, NodeValue::Transaction(_)));
    let connectors = tree.connectors_of(t2);
    assert_eq!(connectors.as_slice(), &[tree.depth_of(tree.list()[1])]);
}
