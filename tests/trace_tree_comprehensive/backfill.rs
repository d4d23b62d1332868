//! Incremental multi-trace backfill.

use parking_lot::Mutex;
use tracelens::fetch::{BackfillOrchestrator, SubTraceRef, TraceQueryParams, TraceResponse};
use tracelens::model::{Policy, TraceMeta};

use crate::{build, trace_payload, txn_json, MockApi};

fn sub(trace_id: &str) -> SubTraceRef {
    SubTraceRef { trace_id: trace_id.to_string(), timestamp: None }
}

fn response(event_id: &str, start: f64, end: f64) -> TraceResponse {
    TraceResponse {
        trace: trace_payload(vec![txn_json(event_id, "p", "http.server", "/", start, end)], vec![]),
        meta: TraceMeta::default(),
    }
}

#[tokio::test]
async fn partial_failure_still_attempts_every_batch() {
    let api = MockApi::new();
    api.stage_trace("tr1", response("t1", 10.0, 11.0));
    api.fail_trace("tr2", "400 bad request");
    api.stage_trace("tr3", response("t3", 30.0, 31.0));
    api.stage_trace("tr4", response("t4", 40.0, 41.0));

    let tree = Mutex::new(build(&trace_payload(
        vec![txn_json("t0", "p", "pageload", "/", 0.0, 1.0)],
        vec![],
    )));
    let orchestrator = BackfillOrchestrator::new(
        api.clone(),
        TraceQueryParams::new("acme"),
        Policy::default(),
    );

    let outcome = orchestrator
        .run(&tree, vec![sub("tr1"), sub("tr2"), sub("tr3"), sub("tr4")])
        .await;

    assert_eq!(outcome.merged, 3);
    assert_eq!(outcome.errors.len(), 1);
    for id in ["tr1", "tr2", "tr3", "tr4"] {
        assert_eq!(api.trace_calls(id), 1, "{id} must be called exactly once");
    }

    let guard = tree.lock();
    for event in ["t0", "t1", "t3", "t4"] {
        assert!(
            guard.find_transaction(&event.into()).is_some(),
            "{event} should be in the merged tree"
        );
    }
    assert!(guard.find_transaction(&"t2".into()).is_none());
    assert!(!orchestrator.is_fetching());
}

#[tokio::test]
async fn merged_traces_extend_rows_and_bounds() {
    let api = MockApi::new();
    api.stage_trace("tr1", response("t1", 5.0, 9.0));

    let tree = Mutex::new(build(&trace_payload(
        vec![txn_json("t0", "p", "pageload", "/", 0.0, 1.0)],
        vec![],
    )));
    let rows_before = tree.lock().list().len();
    let space_before = tree.lock().space();

    let orchestrator = BackfillOrchestrator::new(
        api.clone(),
        TraceQueryParams::new("acme"),
        Policy::default(),
    );
    let outcome = orchestrator.run(&tree, vec![sub("tr1")]).await;
    assert!(outcome.errors.is_empty());

    let guard = tree.lock();
    assert_eq!(guard.list().len(), rows_before + 1);
    // Bounds only ever grow.
    assert!(guard.space().start <= space_before.start);
    assert!(guard.space().end() >= space_before.end());
    assert_eq!(guard.space().end(), 9000.0);
    assert_eq!(guard.events_count, 2);
}

#[tokio::test]
async fn empty_queue_is_a_no_op() {
    let api = MockApi::new();
    let tree = Mutex::new(build(&trace_payload(
        vec![txn_json("t0", "p", "pageload", "/", 0.0, 1.0)],
        vec![],
    )));
    let snapshot = tree.lock().snapshot();

    let orchestrator = BackfillOrchestrator::new(
        api.clone(),
        TraceQueryParams::new("acme"),
        Policy::default(),
    );
    let outcome = orchestrator.run(&tree, Vec::new()).await;

    assert_eq!(outcome.merged, 0);
    assert!(outcome.errors.is_empty());
    assert_eq!(tree.lock().snapshot(), snapshot);
}
