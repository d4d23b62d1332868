//! Time-sliced search over the visible rows.

use std::time::Duration;

use tracelens::model::Policy;
use tracelens::search::{parse_query, SearchResults, SearchTask, SliceOutcome};
use tracelens::tree::TraceTree;

use crate::{build, span_json, spans_event, trace_payload, txn_json};

fn fixture() -> TraceTree {
    let payload = trace_payload(
        vec![
            txn_json("t1", "frontend", "pageload", "/checkout", 0.0, 3.0),
            txn_json("t2", "backend", "http.server", "/api/cart", 0.5, 1.0),
        ],
        vec![],
    );
    let mut tree = build(&payload);
    let txn = tree.children_of(tree.trace_root())[0];
    let event = spans_event(
        None,
        vec![
            span_json("s1", "db", "SELECT * FROM carts", 0.1, 0.8),
            span_json("s2", "http.client", "GET /api/cart", 0.9, 1.0),
        ],
    );
    tree.apply_span_event(txn, &event, &Policy::default()).unwrap();
    tree
}

fn run(tree: &TraceTree, query: &str) -> SearchResults {
    let expr = parse_query(query).expect("query must parse");
    let mut task = SearchTask::new(tree, expr);
    while task.run_slice(Duration::from_millis(12)) == SliceOutcome::Pending {}
    task.results()
}

#[test]
fn matches_come_back_in_row_order_with_ranks() {
    let tree = fixture();
    let results = run(&tree, "op:db OR op:http.client");

    assert_eq!(results.matches.len(), 2);
    let first = tree.list().iter().position(|n| *n == results.matches[0]);
    let second = tree.list().iter().position(|n| *n == results.matches[1]);
    assert!(first < second);
    assert_eq!(results.rank[&results.matches[0]], 0);
    assert_eq!(results.rank[&results.matches[1]], 1);
}

#[test]
fn free_text_reaches_span_descriptions() {
    let tree = fixture();
    let results = run(&tree, "\"SELECT * FROM carts\"");
    assert_eq!(results.matches.len(), 1);
    assert_eq!(tree.node(results.matches[0]).op(), Some("db"));
}

#[test]
fn span_duration_alias_reads_the_space() {
    let tree = fixture();
    // s1 runs 700ms, s2 runs 100ms.
    let results = run(&tree, "span.duration:>500ms");
    assert_eq!(results.matches.len(), 1);
    assert_eq!(tree.node(results.matches[0]).op(), Some("db"));
}

#[test]
fn compound_and_requires_both_sides() {
    let tree = fixture();
    let results = run(&tree, "op:db span.duration:<100ms");
    assert!(results.matches.is_empty());

    let results = run(&tree, "op:db span.duration:>=700ms");
    assert_eq!(results.matches.len(), 1);
}

#[test]
fn search_only_sees_visible_rows() {
    let mut tree = fixture();
    let txn = tree.children_of(tree.trace_root())[0];

    assert_eq!(run(&tree, "op:db").matches.len(), 1);
    // Zooming out hides the span rows from the snapshot the task takes.
    tree.set_zoom(txn, false);
    assert!(run(&tree, "op:db").matches.is_empty());
}

#[test]
fn unknown_fields_never_match() {
    let tree = fixture();
    assert!(run(&tree, "nonexistent.field:>5").matches.is_empty());
}
