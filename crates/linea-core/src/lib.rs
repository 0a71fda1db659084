//! Linea Core - Lineage graph projection and layout
//!
//! This crate provides the pure, synchronous engine behind the lineage view:
//! - Validated lineage graph model over petgraph
//! - Local field-trace closure
//! - Domain aggregation into collapsible buckets
//! - Edge re-projection onto visible proxies
//! - Layered layout with nested containers

pub mod aggregation;
pub mod domain;
pub mod error;
pub mod graph;
pub mod layout;
pub mod render;
pub mod reproject;
pub mod state;
pub mod trace;

// Re-exports for convenience
pub use aggregation::{
    bucket_node_id, project, Bucket, Projection, ProjectionOptions, DEFAULT_AGGREGATION_THRESHOLD,
};
pub use domain::DomainPath;
pub use error::LineaError;
pub use graph::{
    synthesize_edge_id, EdgeView, GraphNode, LineageDirection, LineageGraph, LineageGraphResponse,
    NodeType, PrimaryTag, Provenance, RawEdge, RawNode,
};
pub use layout::{
    field_anchors, layout, FlowDirection, HandleAnchor, Layout, LayoutEdge, LayoutNode,
    LayoutOptions, Point, PositionedNode, Size,
};
pub use render::{
    render, render_response, BucketData, FieldData, NodeData, NodeKind, RenderOptions,
    RenderStats, RenderedGraph, RenderedNode, TableData,
};
pub use reproject::{reproject, EdgeEmphasis, RenderedEdge};
pub use state::ProjectionState;
pub use trace::{trace_locally, TraceResult};
