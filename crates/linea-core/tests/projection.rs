//! Projection properties: aggregation and edge re-projection over whole graphs.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package linea-core --test projection
//! ```

mod common;

use common::{
    assert_coverage, fan_in_graph, nested_sales_graph, sales_orders_graph, GraphBuilder,
};
use linea_core::{
    project, reproject, trace_locally, LineageGraph, Projection, ProjectionOptions,
    ProjectionState,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn defaults() -> ProjectionOptions {
    ProjectionOptions::default()
}

fn collapsed_keys(projection: &Projection) -> Vec<&str> {
    projection
        .collapsed_buckets()
        .map(|b| b.key.as_str())
        .collect()
}

/// Proxy of a raw node as re-projection should resolve it.
fn expected_proxy(graph: &LineageGraph, projection: &Projection, id: &str) -> String {
    let table = graph.owning_table(id).unwrap();
    if projection.is_visible(&table.id) {
        table.id.clone()
    } else {
        projection.bucket_of(&table.id).unwrap().node_id()
    }
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn test_projection_is_idempotent() {
    let graph = sales_orders_graph();
    let mut state = ProjectionState::new();
    state.extract_table("so3");
    state.expand_bucket("Marketing").unwrap();

    let first = project(&graph, "focal", &state, &defaults());
    let second = project(&graph, "focal", &state, &defaults());
    assert_eq!(first, second);
}

#[test]
fn test_coverage_across_states() {
    let graph = nested_sales_graph();
    let mut states = vec![ProjectionState::new()];

    let mut expanded = ProjectionState::new();
    expanded.expand_bucket("Sales").unwrap();
    states.push(expanded.clone());

    let mut extracted = expanded.clone();
    extracted.extract_table("so0");
    extracted.extract_table("sd2");
    states.push(extracted);

    let mut traced = ProjectionState::new();
    traced.involved_ids.insert("so5".to_string());
    traced.expand_bucket("Sales-Orders").unwrap();
    states.push(traced);

    for state in &states {
        for dissolve in [false, true] {
            let options = ProjectionOptions {
                dissolve_single_member_buckets: dissolve,
                ..defaults()
            };
            assert_coverage(&graph, &project(&graph, "focal", state, &options));
        }
    }
}

#[test]
fn test_threshold_boundary() {
    // Focal plus 14 others: exactly 15 active tables
    let at_threshold = project(&fan_in_graph(14), "focal", &ProjectionState::new(), &defaults());
    assert!(!at_threshold.aggregated);
    assert!(at_threshold.buckets.is_empty());
    assert_eq!(at_threshold.visible_tables.len(), 15);

    let above = project(&fan_in_graph(15), "focal", &ProjectionState::new(), &defaults());
    assert!(above.aggregated);
    assert_eq!(collapsed_keys(&above), vec!["Sales"]);
    assert_eq!(above.bucket("Sales").unwrap().members.len(), 15);
}

#[test]
fn test_inactive_tables_do_not_count_toward_threshold() {
    // 20 tables but only 3 touched by edges
    let graph = GraphBuilder::new("focal")
        .table("focal", Some("Finance"))
        .tables("s", 19, "Sales")
        .fan_in("s", 2, "focal")
        .build();
    let projection = project(&graph, "focal", &ProjectionState::new(), &defaults());
    assert!(!projection.aggregated);
    assert_eq!(projection.visible_tables.len(), 20);
}

#[test]
fn test_fully_independent_prefix_never_collapses() {
    let graph = fan_in_graph(20);
    let mut state = ProjectionState::new();
    for i in 0..20 {
        state.extract_table(format!("s{}", i));
    }
    let projection = project(&graph, "focal", &state, &defaults());
    assert!(projection.aggregated);
    assert!(collapsed_keys(&projection).is_empty());
    assert_eq!(projection.visible_tables.len(), 21);
}

#[test]
fn test_edge_conservation() {
    let graph = GraphBuilder::new("focal")
        .table("focal", Some("Finance"))
        .field("focal.amount", "focal")
        .tables("so", 18, "Sales-Orders")
        .field("so0.amount", "so0")
        .field("so1.amount", "so1")
        .fan_in("so", 18, "focal")
        .edge("so0.amount", "focal.amount")
        .edge("so1.amount", "focal.amount")
        .edge("so0", "so1")
        .build();

    let mut state = ProjectionState::new();
    state.extract_table("so2");
    let projection = project(&graph, "focal", &state, &defaults());
    let edges = reproject(&graph, &projection, &state.involved_ids);

    let mut placed: BTreeSet<&str> = BTreeSet::new();
    for edge in &edges {
        assert_ne!(edge.source, edge.target);
        assert_eq!(edge.merged_count, edge.raw_edge_ids.len());
        for id in &edge.raw_edge_ids {
            assert!(placed.insert(id.as_str()), "raw edge {} placed twice", id);
        }
    }

    for raw in graph.iter_edges() {
        let folded = expected_proxy(&graph, &projection, raw.source)
            == expected_proxy(&graph, &projection, raw.target);
        assert_eq!(
            placed.contains(raw.id),
            !folded,
            "raw edge {} ({} -> {})",
            raw.id,
            raw.source,
            raw.target
        );
    }

    // The two folded field edges merge into one bucket-level edge keeping the target handle
    let merged = edges
        .iter()
        .find(|e| e.target_handle.as_deref() == Some("focal.amount"))
        .unwrap();
    assert_eq!(merged.source, "bucket:Sales-Orders");
    assert_eq!(merged.merged_count, 2);
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_sales_orders_scenario() {
    let graph = sales_orders_graph();
    let projection = project(&graph, "focal", &ProjectionState::new(), &defaults());

    assert_eq!(collapsed_keys(&projection), vec!["Sales-Orders"]);
    let bucket = projection.bucket("Sales-Orders").unwrap();
    assert_eq!(bucket.members.len(), 18);
    assert_eq!(bucket.total, 18);
    assert_eq!(bucket.level, 2);
    assert_eq!(bucket.label, "Orders");

    let visible: Vec<&str> = projection.visible_tables.iter().map(String::as_str).collect();
    assert_eq!(visible, vec!["campaigns", "focal"]);
    assert!(projection.bridges.contains("campaigns"));
    assert_coverage(&graph, &projection);
}

#[test]
fn test_expand_sales_then_collapse_orders() {
    let graph = nested_sales_graph();

    // Without manual state the direct Sales tables keep "Sales" collapsed
    let initial = project(&graph, "focal", &ProjectionState::new(), &defaults());
    assert_eq!(collapsed_keys(&initial), vec!["Sales"]);
    assert_eq!(initial.bucket("Sales").unwrap().members.len(), 19);

    let mut state = ProjectionState::new();
    state.expand_bucket("Sales").unwrap();
    state.expand_bucket("Sales-Orders").unwrap();
    state.collapse_bucket("Sales-Orders").unwrap();
    let nested = project(&graph, "focal", &state, &defaults());

    let sales = nested.bucket("Sales").unwrap();
    assert!(sales.expanded);
    assert!(sales.members.is_empty());
    assert_eq!(sales.total, 19);

    let orders = nested.bucket("Sales-Orders").unwrap();
    assert!(!orders.expanded);
    assert_eq!(orders.members.len(), 16);

    for id in ["sd0", "sd1", "sd2"] {
        assert!(nested.is_visible(id), "{} should be visible", id);
    }
    assert_coverage(&graph, &nested);

    // Collapsing the parent folds everything back
    state.collapse_bucket("Sales").unwrap();
    let refolded = project(&graph, "focal", &state, &defaults());
    assert_eq!(refolded, initial);
}

#[test]
fn test_extract_table_from_bucket() {
    let graph = sales_orders_graph();
    let before = project(&graph, "focal", &ProjectionState::new(), &defaults());
    assert!(before.bucket_of("so7").is_some());

    let mut state = ProjectionState::new();
    state.extract_table("so7");
    let after = project(&graph, "focal", &state, &defaults());

    let bucket = after.bucket("Sales-Orders").unwrap();
    assert!(!bucket.members.iter().any(|m| m == "so7"));
    assert_eq!(bucket.members.len(), 17);
    assert!(after.is_visible("so7"));
    assert!(after.independent.contains("so7"));
}

#[test]
fn test_trace_pulls_fields_out_of_buckets() {
    let graph = GraphBuilder::new("focal")
        .table("focal", Some("Finance"))
        .field("focal.total", "focal")
        .tables("so", 18, "Sales-Orders")
        .field("so4.total", "so4")
        .fan_in("so", 18, "focal")
        .edge("so4.total", "focal.total")
        .build();

    let mut state = ProjectionState::new();
    state.apply_trace(&trace_locally(&graph, "focal.total"));
    let projection = project(&graph, "focal", &state, &defaults());

    assert!(projection.is_visible("so4"));
    assert_eq!(projection.bucket("Sales-Orders").unwrap().members.len(), 17);

    let edges = reproject(&graph, &projection, &state.involved_ids);
    // Every raw edge touches the involved focal table
    assert!(edges.iter().all(|e| e.traced));

    let field_edge = edges
        .iter()
        .find(|e| e.source_handle.is_some())
        .unwrap();
    assert_eq!(field_edge.source, "so4");
    assert_eq!(field_edge.source_handle.as_deref(), Some("so4.total"));
    assert_eq!(field_edge.target_handle.as_deref(), Some("focal.total"));

    let bucket_edge = edges
        .iter()
        .find(|e| e.source == "bucket:Sales-Orders")
        .unwrap();
    assert_eq!(bucket_edge.merged_count, 17);
}

#[test]
fn test_table_edges_of_traced_tables_are_highlighted() {
    let graph = GraphBuilder::new("t1")
        .table("t1", Some("Finance"))
        .table("t2", Some("Sales"))
        .field("t1.a", "t1")
        .field("t2.a", "t2")
        .edge("t2", "t1")
        .edge("t2.a", "t1.a")
        .build();

    let mut state = ProjectionState::new();
    state.apply_trace(&trace_locally(&graph, "t1.a"));
    assert!(state.involved_ids.contains("t1"));
    assert!(state.involved_ids.contains("t2"));

    let projection = project(&graph, "t1", &state, &defaults());
    let edges = reproject(&graph, &projection, &state.involved_ids);
    assert_eq!(edges.len(), 2);

    let table_edge = edges.iter().find(|e| e.source_handle.is_none()).unwrap();
    assert_eq!((table_edge.source.as_str(), table_edge.target.as_str()), ("t2", "t1"));
    assert!(table_edge.traced);
    assert_eq!(table_edge.emphasis.color, "#1890ff");
}
