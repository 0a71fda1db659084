//! Edge re-projection.
//!
//! Every raw edge is redirected onto the visible proxies that currently stand in
//! for its endpoints: the owning table (keeping the field handle) when that table
//! is visible, otherwise the most specific collapsed bucket on its domain path.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::aggregation::Projection;
use crate::graph::{synthesize_edge_id, LineageGraph, Provenance};

/// Colour of traced edges, and of manual edges outside a trace.
pub const TRACE_COLOR: &str = "#1890ff";
const MANUAL_COLOR: &str = "#1890ff";
const APPROVED_COLOR: &str = "#52c41a";
const INFERRED_COLOR: &str = "#d9d9d9";
const FADED_COLOR: &str = "#f0f0f0";

/// Visual attributes of a rendered edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeEmphasis {
    pub color: &'static str,
    pub width: u32,
    pub animated: bool,
    pub opacity: f32,
    pub z_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl EdgeEmphasis {
    /// Styling rules: the trace flag overrides provenance when a trace is active.
    pub fn new(provenance: Provenance, traced: bool, tracing: bool, field_level: bool) -> Self {
        let base_color = match provenance {
            Provenance::Manual => MANUAL_COLOR,
            Provenance::Approved => APPROVED_COLOR,
            Provenance::Inferred => INFERRED_COLOR,
        };
        let label = Some(provenance.as_str().to_uppercase());

        if tracing && !traced {
            return Self {
                color: FADED_COLOR,
                width: if field_level { 1 } else { 2 },
                animated: false,
                opacity: 0.2,
                z_index: 0,
                label: None,
            };
        }

        if traced {
            return Self {
                color: TRACE_COLOR,
                width: 3,
                animated: true,
                opacity: 1.0,
                z_index: 1000,
                label,
            };
        }

        Self {
            color: base_color,
            width: if field_level { 1 } else { 2 },
            animated: provenance == Provenance::Inferred,
            opacity: 1.0,
            z_index: 0,
            label,
        }
    }
}

/// An edge between visible proxies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedEdge {
    pub id: String,
    pub source: String,
    pub target: String,

    /// Field anchor on the source table, when the edge was not folded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,

    /// Provenance of the first raw edge merged into this one
    pub provenance: Provenance,

    /// True if any merged raw edge touches a traced field
    pub traced: bool,

    pub merged_count: usize,
    pub raw_edge_ids: Vec<String>,
    pub emphasis: EdgeEmphasis,
}

impl RenderedEdge {
    pub fn is_field_level(&self) -> bool {
        self.source_handle.is_some() || self.target_handle.is_some()
    }
}

/// Resolved endpoint: the proxy node id plus an optional field handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Endpoint {
    proxy: String,
    handle: Option<String>,
}

fn resolve_endpoint(graph: &LineageGraph, projection: &Projection, id: &str) -> Option<Endpoint> {
    let node = graph.get_node(id)?;
    let table = graph.owning_table(id)?;

    if projection.is_visible(&table.id) {
        return Some(Endpoint {
            proxy: table.id.clone(),
            handle: node.is_field().then(|| node.id.clone()),
        });
    }

    let path = table.domain_path.as_ref()?;
    projection.collapsed_bucket_for(path).map(|bucket| Endpoint {
        proxy: bucket.node_id(),
        handle: None,
    })
}

/// Re-project all raw edges onto the current projection.
///
/// Self-loops created by folding are dropped; edges sharing
/// `(source, target, source_handle, target_handle)` are merged, first seen wins.
pub fn reproject(
    graph: &LineageGraph,
    projection: &Projection,
    involved_ids: &BTreeSet<String>,
) -> Vec<RenderedEdge> {
    let tracing = !involved_ids.is_empty();
    let mut edges: Vec<RenderedEdge> = Vec::new();
    let mut index: HashMap<(Endpoint, Endpoint), usize> = HashMap::new();
    let mut dropped = 0usize;

    for raw in graph.iter_edges() {
        let (Some(source), Some(target)) = (
            resolve_endpoint(graph, projection, raw.source),
            resolve_endpoint(graph, projection, raw.target),
        ) else {
            debug!("Edge '{}' has no visible proxy, skipping", raw.id);
            dropped += 1;
            continue;
        };

        if source.proxy == target.proxy {
            dropped += 1;
            continue;
        }

        let traced = involved_ids.contains(raw.source) || involved_ids.contains(raw.target);
        let key = (source, target);
        if let Some(&i) = index.get(&key) {
            let edge = &mut edges[i];
            edge.traced |= traced;
            edge.merged_count += 1;
            edge.raw_edge_ids.push(raw.id.to_string());
            continue;
        }

        let (source, target) = key.clone();
        edges.push(RenderedEdge {
            id: raw.id.to_string(),
            source: source.proxy,
            target: target.proxy,
            source_handle: source.handle,
            target_handle: target.handle,
            provenance: raw.provenance,
            traced,
            merged_count: 1,
            raw_edge_ids: vec![raw.id.to_string()],
            emphasis: EdgeEmphasis::new(raw.provenance, false, false, false),
        });
        index.insert(key, edges.len() - 1);
    }

    for edge in &mut edges {
        if edge.merged_count > 1 || is_bucket_edge(projection, edge) {
            edge.id = rendered_edge_id(edge);
        }
        edge.emphasis = EdgeEmphasis::new(edge.provenance, edge.traced, tracing, edge.is_field_level());
    }

    debug!(
        "Re-projected {} raw edges into {} rendered edges ({} dropped)",
        graph.edge_count(),
        edges.len(),
        dropped
    );
    edges
}

fn is_bucket_edge(projection: &Projection, edge: &RenderedEdge) -> bool {
    !projection.is_visible(&edge.source) || !projection.is_visible(&edge.target)
}

/// Id for an edge that no longer stands for a single raw relationship.
fn rendered_edge_id(edge: &RenderedEdge) -> String {
    let mut id = synthesize_edge_id(&edge.source, &edge.target);
    if edge.is_field_level() {
        id.push_str(&format!(
            "-{}-{}",
            edge.source_handle.as_deref().unwrap_or_default(),
            edge.target_handle.as_deref().unwrap_or_default()
        ));
    }
    id
}
