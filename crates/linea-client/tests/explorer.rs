//! Explorer session behaviour: fetch ordering, loading gate, local
//! interactions, trace resolution and edge deletion.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package linea-client --test explorer
//! ```

mod common;

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{sales_response, small_response, FakeLineageApi};
use linea_client::{resolve_trace, ClientError, LineageApi, LineageExplorer, LoadOutcome};
use linea_core::{LineaError, LineageDirection, ProjectionState, RenderOptions, TraceResult};
use pretty_assertions::assert_eq;

const UP: LineageDirection = LineageDirection::Upstream;

fn explorer(api: &Arc<FakeLineageApi>) -> LineageExplorer<Arc<FakeLineageApi>> {
    LineageExplorer::new(Arc::clone(api), RenderOptions::default())
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Fetching
// ============================================================================

#[tokio::test]
async fn test_render_before_load_is_empty() {
    let api = FakeLineageApi::new();
    let explorer = explorer(&api);

    assert!(explorer.render().is_empty());
    assert!(!explorer.is_loading());
    assert!(matches!(explorer.reload().await, Err(ClientError::NothingLoaded)));
}

#[tokio::test]
async fn test_select_and_render() {
    let api = FakeLineageApi::new().with_graph(sales_response());
    let explorer = explorer(&api);

    let outcome = explorer.select_table("orders", UP, 3).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Installed);

    let rendered = explorer.render();
    assert!(rendered.node("orders").unwrap().table_data().unwrap().focal);
    let bucket = rendered.node("bucket:Sales-Orders").unwrap();
    assert_eq!(bucket.bucket_data().unwrap().table_count, 18);
}

#[tokio::test]
async fn test_stale_response_is_discarded() {
    let api = FakeLineageApi::new()
        .with_graph(small_response("a"))
        .with_graph(small_response("b"));
    let explorer = explorer(&api);
    let held = api.hold("a");

    let first = explorer.select_table("a", UP, 3);
    let second = async {
        tokio::task::yield_now().await;
        let outcome = explorer.select_table("b", UP, 3).await;
        held.notify_one();
        outcome
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), LoadOutcome::Stale);
    assert_eq!(second.unwrap(), LoadOutcome::Installed);
    assert_eq!(explorer.loaded_request().unwrap().table_id, "b");
    assert!(explorer.render().node("b").is_some());
    assert!(!explorer.is_loading());
}

#[tokio::test]
async fn test_reissued_request_wins_over_later_one() {
    let api = FakeLineageApi::new()
        .with_graph(small_response("a"))
        .with_graph(small_response("b"));
    let explorer = explorer(&api);
    let held_a = api.hold("a");
    let held_b = api.hold("b");

    let first = explorer.select_table("a", UP, 3);
    let second = async {
        tokio::task::yield_now().await;
        explorer.select_table("b", UP, 3).await
    };
    let third = async {
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        let outcome = explorer.select_table("a", UP, 3).await;
        held_b.notify_one();
        held_a.notify_one();
        outcome
    };
    let (first, second, third) = tokio::join!(first, second, third);

    assert_eq!(third.unwrap(), LoadOutcome::AlreadyInFlight);
    assert_eq!(second.unwrap(), LoadOutcome::Stale);
    assert_eq!(first.unwrap(), LoadOutcome::Installed);
    assert_eq!(explorer.current().unwrap().table_id, "a");
    assert_eq!(explorer.loaded_request().unwrap().table_id, "a");
    assert!(explorer.render().node("a").is_some());
    assert_eq!(api.fetch_count(), 2);
    assert!(!explorer.is_loading());
}

#[tokio::test]
async fn test_direction_change_is_busy_while_loading() {
    let api = FakeLineageApi::new().with_graph(small_response("a"));
    let explorer = explorer(&api);
    let held = api.hold("a");

    let load = explorer.select_table("a", UP, 3);
    let meanwhile = async {
        tokio::task::yield_now().await;
        let loading = explorer.is_loading();
        let direction = explorer.set_direction(LineageDirection::Downstream).await;
        let depth = explorer.set_depth(5).await;
        let duplicate = explorer.select_table("a", UP, 3).await;
        held.notify_one();
        (loading, direction, depth, duplicate)
    };
    let (outcome, (loading, direction, depth, duplicate)) = tokio::join!(load, meanwhile);

    assert_eq!(outcome.unwrap(), LoadOutcome::Installed);
    assert!(loading);
    assert!(matches!(direction, Err(ClientError::Busy)));
    assert!(matches!(depth, Err(ClientError::Busy)));
    assert_eq!(duplicate.unwrap(), LoadOutcome::AlreadyInFlight);
    assert_eq!(api.fetch_count(), 1);
    assert!(!explorer.is_loading());
}

#[tokio::test]
async fn test_direction_change_refetches_and_keeps_state() {
    let api = FakeLineageApi::new().with_graph(sales_response());
    let explorer = explorer(&api);
    explorer.select_table("orders", UP, 3).await.unwrap();
    explorer.expand_bucket("Sales-Orders").unwrap();

    explorer.set_direction(LineageDirection::Both).await.unwrap();
    explorer.set_depth(2).await.unwrap();

    let fetches = api.fetches.lock().clone();
    assert_eq!(fetches.len(), 3);
    assert_eq!(fetches[1].direction, LineageDirection::Both);
    assert_eq!(fetches[2].depth, 2);
    assert_eq!(fetches[2].direction, LineageDirection::Both);
    assert!(explorer
        .projection_state()
        .manual_expanded_paths
        .contains("Sales-Orders"));
}

#[tokio::test]
async fn test_zero_depth_is_rejected() {
    let api = FakeLineageApi::new().with_graph(small_response("a"));
    let explorer = explorer(&api);
    explorer.select_table("a", UP, 3).await.unwrap();

    assert!(matches!(explorer.set_depth(0).await, Err(ClientError::Config(_))));
    assert_eq!(api.fetch_count(), 1);
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_graph() {
    let api = FakeLineageApi::new().with_graph(sales_response());
    let explorer = explorer(&api);
    explorer.select_table("orders", UP, 3).await.unwrap();

    api.fail_fetch.store(true, Ordering::SeqCst);
    let err = explorer.set_depth(4).await.unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 503, .. }));

    assert_eq!(explorer.loaded_request().unwrap().depth, 3);
    assert!(!explorer.render().is_empty());
    assert!(!explorer.is_loading());
}

#[tokio::test]
async fn test_table_change_resets_projection_state() {
    let api = FakeLineageApi::new()
        .with_graph(sales_response())
        .with_graph(small_response("b"));
    let explorer = explorer(&api);
    explorer.select_table("orders", UP, 3).await.unwrap();
    explorer.expand_bucket("Sales").unwrap();
    explorer.extract_table("so4").unwrap();

    explorer.select_table("b", UP, 3).await.unwrap();
    assert_eq!(explorer.projection_state(), ProjectionState::default());
}

#[tokio::test]
async fn test_missing_root_id_falls_back_to_request() {
    let mut response = small_response("a");
    response.root_id = String::new();
    let api = FakeLineageApi::new().with_graph_for("a", response);
    let explorer = explorer(&api);

    explorer.select_table("a", UP, 3).await.unwrap();
    assert_eq!(explorer.graph().unwrap().root_id(), "a");
}

// ============================================================================
// Local interactions
// ============================================================================

#[tokio::test]
async fn test_bucket_toggles_do_not_fetch() {
    let api = FakeLineageApi::new().with_graph(sales_response());
    let explorer = explorer(&api);
    explorer.select_table("orders", UP, 3).await.unwrap();

    explorer.expand_bucket("Sales-Orders").unwrap();
    let expanded = explorer.render();
    assert!(expanded.node("so7").is_some());
    assert!(expanded.node("bucket:Sales-Orders").unwrap().bucket_data().unwrap().expanded);

    explorer.collapse_bucket("Sales-Orders").unwrap();
    let collapsed = explorer.render();
    assert!(collapsed.node("so7").is_none());

    assert_eq!(api.fetch_count(), 1);
}

#[tokio::test]
async fn test_extract_table_validates_node() {
    let api = FakeLineageApi::new().with_graph(sales_response());
    let explorer = explorer(&api);

    assert!(matches!(explorer.extract_table("so3"), Err(ClientError::NothingLoaded)));
    explorer.select_table("orders", UP, 3).await.unwrap();

    explorer.extract_table("so3").unwrap();
    assert!(explorer.render().node("so3").is_some());

    let err = explorer.extract_table("so0.amount").unwrap_err();
    assert!(matches!(
        err,
        ClientError::Projection(LineaError::WrongNodeType { .. })
    ));
    let err = explorer.extract_table("ghost").unwrap_err();
    assert!(matches!(
        err,
        ClientError::Projection(LineaError::NodeNotFound { .. })
    ));
}

#[tokio::test]
async fn test_invalid_bucket_key() {
    let api = FakeLineageApi::new();
    let explorer = explorer(&api);
    assert!(matches!(
        explorer.expand_bucket(""),
        Err(ClientError::Projection(LineaError::InvalidBucketKey(_)))
    ));
}

// ============================================================================
// Trace
// ============================================================================

#[tokio::test]
async fn test_trace_uses_service_result() {
    let api = FakeLineageApi::new().with_graph(sales_response());
    api.serve_trace(TraceResult {
        involved_fields: set(&["orders.amount"]),
        involved_tables: set(&["orders", "so9"]),
    });
    let explorer = explorer(&api);
    explorer.select_table("orders", UP, 3).await.unwrap();

    let result = explorer.trace_field("orders.amount").await;
    assert_eq!(result.involved_tables, set(&["orders", "so9"]));
    assert!(explorer.projection_state().is_tracing());

    // Service-reported tables are pulled out of their bucket
    let rendered = explorer.render();
    assert!(rendered.node("so9").is_some());
}

#[tokio::test]
async fn test_trace_falls_back_to_local_closure() {
    let api = FakeLineageApi::new().with_graph(sales_response());
    let explorer = explorer(&api);
    explorer.select_table("orders", UP, 3).await.unwrap();

    let result = explorer.trace_field("orders.amount").await;
    assert_eq!(api.trace_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.involved_fields, set(&["orders.amount", "so0.amount"]));
    assert_eq!(result.involved_tables, set(&["orders", "so0"]));

    let rendered = explorer.render();
    let traced: Vec<&str> = rendered
        .edges
        .iter()
        .filter(|e| e.traced)
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(traced, vec!["rf"]);
    assert!(rendered.node("so1").is_none());

    explorer.clear_trace();
    assert!(!explorer.projection_state().is_tracing());
}

#[tokio::test]
async fn test_resolve_trace_without_graph_is_empty() {
    let api = FakeLineageApi::new();
    let result = resolve_trace(api.as_ref(), None, "f1").await;
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_resolve_trace_through_trait_object() {
    let api = FakeLineageApi::new();
    api.serve_trace(TraceResult {
        involved_fields: set(&["f1"]),
        involved_tables: set(&["t1"]),
    });
    let dyn_api: Arc<dyn LineageApi> = api;
    let result = resolve_trace(dyn_api.as_ref(), None, "f1").await;
    assert_eq!(result.involved_fields, set(&["f1"]));
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_confirmed_deletion_refetches() {
    let api = FakeLineageApi::new().with_graph(sales_response());
    let explorer = explorer(&api);
    explorer.select_table("orders", UP, 3).await.unwrap();

    let pending = explorer.delete_edge("r3").unwrap();
    assert_eq!(pending.source(), "so3");
    assert_eq!(pending.target(), "orders");
    assert!(api.deleted.lock().is_empty());

    let outcome = pending.confirm().await.unwrap();
    assert_eq!(outcome, LoadOutcome::Installed);
    assert_eq!(*api.deleted.lock(), vec!["r3".to_string()]);
    assert_eq!(api.fetch_count(), 2);
}

#[tokio::test]
async fn test_cancelled_deletion_does_nothing() {
    let api = FakeLineageApi::new().with_graph(sales_response());
    let explorer = explorer(&api);
    explorer.select_table("orders", UP, 3).await.unwrap();

    explorer.delete_edge("rf").unwrap().cancel();
    assert!(api.deleted.lock().is_empty());
    assert_eq!(api.fetch_count(), 1);
}

#[tokio::test]
async fn test_failed_deletion_mutates_nothing() {
    let api = FakeLineageApi::new().with_graph(sales_response());
    let explorer = explorer(&api);
    explorer.select_table("orders", UP, 3).await.unwrap();
    let before = explorer.render();

    api.fail_delete.store(true, Ordering::SeqCst);
    let err = explorer.delete_edge("r3").unwrap().confirm().await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound { .. }));

    assert_eq!(api.fetch_count(), 1);
    assert_eq!(explorer.render(), before);
}

#[tokio::test]
async fn test_unknown_edge() {
    let api = FakeLineageApi::new().with_graph(sales_response());
    let explorer = explorer(&api);
    explorer.select_table("orders", UP, 3).await.unwrap();

    assert!(matches!(
        explorer.delete_edge("nope"),
        Err(ClientError::UnknownEdge(_))
    ));
}
