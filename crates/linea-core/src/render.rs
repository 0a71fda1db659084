//! The full projection pipeline.
//!
//! `render` is a pure function of the raw graph, the focal table and the
//! projection state: aggregation, container resolution, edge re-projection
//! and layout all run in one synchronous pass over fresh data structures.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregation::{project, Bucket, Projection, ProjectionOptions};
use crate::domain::DomainPath;
use crate::graph::{GraphNode, LineageGraph, LineageGraphResponse};
use crate::layout::{
    field_anchors, layout, HandleAnchor, LayoutEdge, LayoutNode, LayoutOptions, Point,
};
use crate::reproject::{reproject, RenderedEdge};
use crate::state::ProjectionState;

/// Options for one render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub projection: ProjectionOptions,
    pub layout: LayoutOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Table,
    Bucket,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Table => "table",
            NodeKind::Bucket => "bucket",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldData {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableData {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<DomainPath>,
    pub fields: Vec<FieldData>,
    /// Fields on the active trace
    pub highlighted_fields: Vec<String>,
    pub focal: bool,
    /// The table itself is on the active trace
    pub traced: bool,
    /// Faded out because a trace is active and does not touch this table
    pub dimmed: bool,
    pub handles: Vec<HandleAnchor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketData {
    pub key: String,
    pub label: String,
    pub level: usize,
    pub expanded: bool,
    pub table_count: usize,
    pub members: Vec<String>,
}

impl From<&Bucket> for BucketData {
    fn from(bucket: &Bucket) -> Self {
        Self {
            key: bucket.key.clone(),
            label: bucket.label.clone(),
            level: bucket.level,
            expanded: bucket.expanded,
            table_count: bucket.total,
            members: bucket.members.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeData {
    Table(TableData),
    Bucket(BucketData),
}

/// A positioned node ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedNode {
    pub id: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Relative to the parent container, absolute at top level
    pub position: Point,
    pub absolute: Point,
    pub width: f64,
    pub height: f64,
    pub data: NodeData,
}

impl RenderedNode {
    pub fn table_data(&self) -> Option<&TableData> {
        match &self.data {
            NodeData::Table(data) => Some(data),
            NodeData::Bucket(_) => None,
        }
    }

    pub fn bucket_data(&self) -> Option<&BucketData> {
        match &self.data {
            NodeData::Bucket(data) => Some(data),
            NodeData::Table(_) => None,
        }
    }
}

/// Counters describing one render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub raw_tables: usize,
    pub raw_edges: usize,
    pub visible_tables: usize,
    pub collapsed_buckets: usize,
    pub expanded_buckets: usize,
    pub rendered_edges: usize,
    pub aggregated: bool,
}

/// Output of [`render`]: parents precede children in `nodes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderedGraph {
    pub nodes: Vec<RenderedNode>,
    pub edges: Vec<RenderedEdge>,
    pub width: f64,
    pub height: f64,
    pub stats: RenderStats,
}

impl RenderedGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&RenderedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&RenderedEdge> {
        self.edges.iter().find(|e| e.id == id)
    }
}

/// Run aggregation, re-projection and layout over a loaded graph.
pub fn render(
    graph: &LineageGraph,
    focal_id: &str,
    state: &ProjectionState,
    options: &RenderOptions,
) -> RenderedGraph {
    if graph.is_empty() {
        return RenderedGraph::default();
    }

    let projection = project(graph, focal_id, state, &options.projection);
    let edges = reproject(graph, &projection, &state.involved_ids);

    let mut layout_nodes = Vec::new();
    for bucket in &projection.buckets {
        let parent = enclosing_shell(&projection, &bucket.path, false);
        let node = if bucket.expanded {
            LayoutNode::container(bucket.node_id())
        } else {
            LayoutNode::fixed(bucket.node_id(), options.layout.bucket_size)
        };
        layout_nodes.push(with_parent(node, parent));
    }
    let visible: Vec<&GraphNode> = graph
        .tables()
        .filter(|t| projection.is_visible(&t.id))
        .collect();
    for table in &visible {
        let parent = table
            .domain_path
            .as_ref()
            .and_then(|path| enclosing_shell(&projection, path, true));
        let node = LayoutNode::fixed(table.id.clone(), options.layout.table_size);
        layout_nodes.push(with_parent(node, parent));
    }

    let layout_edges: Vec<LayoutEdge> = edges
        .iter()
        .map(|e| LayoutEdge::new(e.source.clone(), e.target.clone()))
        .collect();
    let positioned = layout(&layout_nodes, &layout_edges, &options.layout);

    let tracing = state.is_tracing();
    let nodes: Vec<RenderedNode> = positioned
        .nodes
        .into_iter()
        .filter_map(|p| {
            let (kind, data) = match graph.get_node(&p.id) {
                Some(table) if projection.is_visible(&table.id) => (
                    NodeKind::Table,
                    NodeData::Table(table_data(graph, table, focal_id, state, tracing, options)),
                ),
                _ => {
                    let bucket = projection
                        .buckets
                        .iter()
                        .find(|b| b.node_id() == p.id)?;
                    (NodeKind::Bucket, NodeData::Bucket(BucketData::from(bucket)))
                }
            };
            Some(RenderedNode {
                id: p.id,
                kind,
                parent_id: p.parent,
                position: p.position,
                absolute: p.absolute,
                width: p.size.width,
                height: p.size.height,
                data,
            })
        })
        .collect();

    let stats = RenderStats {
        raw_tables: graph.tables().count(),
        raw_edges: graph.edge_count(),
        visible_tables: visible.len(),
        collapsed_buckets: projection.collapsed_buckets().count(),
        expanded_buckets: projection.expanded_buckets().count(),
        rendered_edges: edges.len(),
        aggregated: projection.aggregated,
    };
    debug!("Rendered {:?}", stats);

    RenderedGraph {
        nodes,
        edges,
        width: positioned.width,
        height: positioned.height,
        stats,
    }
}

/// Convenience entry point straight from a backend response, focused on its root.
pub fn render_response(
    response: &LineageGraphResponse,
    state: &ProjectionState,
    options: &RenderOptions,
) -> RenderedGraph {
    let graph = LineageGraph::from_response(response);
    let focal = graph.root_id().to_string();
    render(&graph, &focal, state, options)
}

fn with_parent(node: LayoutNode, parent: Option<String>) -> LayoutNode {
    match parent {
        Some(parent) => node.with_parent(parent),
        None => node,
    }
}

/// Node id of the most specific expanded shell containing `path`.
///
/// Tables may sit in a shell for their own full path; buckets only in a
/// strictly shorter one.
fn enclosing_shell(projection: &Projection, path: &DomainPath, inclusive: bool) -> Option<String> {
    let limit = if inclusive { path.len() } else { path.len().saturating_sub(1) };
    (1..=limit)
        .rev()
        .filter_map(|len| path.prefix(len))
        .find_map(|prefix| projection.bucket(&prefix.key()).filter(|b| b.expanded))
        .map(Bucket::node_id)
}

fn table_data(
    graph: &LineageGraph,
    table: &GraphNode,
    focal_id: &str,
    state: &ProjectionState,
    tracing: bool,
    options: &RenderOptions,
) -> TableData {
    let fields = graph.fields_of(&table.id);
    let highlighted_fields: Vec<String> = fields
        .iter()
        .filter(|f| state.involved_ids.contains(&f.id))
        .map(|f| f.id.clone())
        .collect();
    let focal = table.id == focal_id;
    let traced = state.involved_ids.contains(&table.id);
    let handles = field_anchors(
        fields.iter().map(|f| f.id.as_str()),
        options.layout.table_size,
        options.layout.flow,
    );

    TableData {
        label: table.label.clone(),
        source_name: table.source_name.clone(),
        domain: table.domain_path.clone(),
        fields: fields
            .iter()
            .map(|f| FieldData {
                id: f.id.clone(),
                label: f.label.clone(),
            })
            .collect(),
        dimmed: tracing && highlighted_fields.is_empty() && !traced && !focal,
        highlighted_fields,
        focal,
        traced,
        handles,
    }
}
