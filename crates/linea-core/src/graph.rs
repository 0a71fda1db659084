//! Lineage graph model.
//!
//! This module defines the wire format returned by the lineage backend
//! (`LineageGraphResponse`) and the validated, indexed [`LineageGraph`] the
//! projection engine works on.
//!
//! The graph is backed by `petgraph::StableGraph` with an id → index map, so
//! node lookups are O(1) and neighbour queries use adjacency lists.

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::domain::DomainPath;
use crate::error::LineaError;

// ============================================================================
// Node and Edge Types
// ============================================================================

/// Kind of node in a lineage graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    Table,
    Field,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Table => "table",
            NodeType::Field => "field",
        }
    }
}

/// How a lineage relationship came to exist.
///
/// Informational only: it drives edge emphasis, never aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Entered by a user
    #[default]
    Manual,
    /// Inferred and then approved by a reviewer
    Approved,
    /// Inferred automatically (parsers, AI)
    Inferred,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Manual => "manual",
            Provenance::Approved => "approved",
            Provenance::Inferred => "inferred",
        }
    }
}

/// Case-insensitive: the backend has emitted both `manual` and `MANUAL`.
impl<'de> Deserialize<'de> for Provenance {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(Provenance::Manual),
            "approved" => Ok(Provenance::Approved),
            "inferred" => Ok(Provenance::Inferred),
            _ => Err(serde::de::Error::unknown_variant(
                &s,
                &["manual", "approved", "inferred"],
            )),
        }
    }
}

/// Traversal direction of a lineage neighbourhood request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineageDirection {
    #[default]
    Upstream,
    Downstream,
    Both,
}

impl LineageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineageDirection::Upstream => "upstream",
            LineageDirection::Downstream => "downstream",
            LineageDirection::Both => "both",
        }
    }
}

impl std::fmt::Display for LineageDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LineageDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upstream" | "up" => Ok(LineageDirection::Upstream),
            "downstream" | "down" => Ok(LineageDirection::Downstream),
            "both" => Ok(LineageDirection::Both),
            _ => Err(format!(
                "unknown direction '{}', expected: upstream, downstream, both",
                s
            )),
        }
    }
}

// ============================================================================
// Wire Format
// ============================================================================

/// Primary tag attached to a table by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Delimited tag hierarchy, e.g. `Finance-Billing`
    pub path: String,
}

/// A node as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(rename = "type", default)]
    pub node_type: NodeType,

    /// Owning table, for field nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal_position: Option<i64>,

    /// Hop distance from the root, when the backend computed it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<u32>,

    /// Explicit domain path; takes precedence over `primary_tag.path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_tag: Option<PrimaryTag>,
}

impl RawNode {
    /// Create a table node.
    pub fn table(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: Some(label.into()),
            node_type: NodeType::Table,
            parent_id: None,
            source_id: None,
            source_name: None,
            ordinal_position: None,
            distance: None,
            domain_path: None,
            primary_tag: None,
        }
    }

    /// Create a field node owned by `parent_id`.
    pub fn field(
        id: impl Into<String>,
        label: impl Into<String>,
        parent_id: impl Into<String>,
    ) -> Self {
        Self {
            node_type: NodeType::Field,
            parent_id: Some(parent_id.into()),
            ..Self::table(id, label)
        }
    }

    /// Set the domain path.
    pub fn with_domain(mut self, path: impl Into<String>) -> Self {
        self.domain_path = Some(path.into());
        self
    }

    /// Set the ordinal position (fields).
    pub fn with_ordinal(mut self, ordinal: i64) -> Self {
        self.ordinal_position = Some(ordinal);
        self
    }

    /// The raw domain string, preferring `domain_path` over the primary tag.
    pub fn raw_domain(&self) -> Option<&str> {
        self.domain_path
            .as_deref()
            .or_else(|| self.primary_tag.as_ref().map(|t| t.path.as_str()))
    }
}

/// An edge as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "from", alias = "source_id", alias = "source")]
    pub source_id: String,

    #[serde(rename = "to", alias = "target_id", alias = "target")]
    pub target_id: String,

    /// `table` or `field` granularity, informational
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage_source: Option<Provenance>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl RawEdge {
    /// Create an edge without an id.
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            id: None,
            source_id: source_id.into(),
            target_id: target_id.into(),
            edge_type: None,
            lineage_source: None,
            confidence: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.lineage_source = Some(provenance);
        self
    }
}

/// Lineage neighbourhood response for `(table, direction, depth)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineageGraphResponse {
    #[serde(default)]
    pub root_id: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub nodes: Vec<RawNode>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub edges: Vec<RawEdge>,
}

impl LineageGraphResponse {
    /// Parse a JSON response body.
    pub fn from_json(json: &str) -> Result<Self, LineaError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// The backend sends `null` for empty neighbourhoods.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Validated Graph
// ============================================================================

/// A validated node in the lineage graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    pub label: String,

    /// Owning table id (fields only); always resolves to a table in the graph
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Domain hierarchy (tables only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_path: Option<DomainPath>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordinal_position: Option<i64>,
}

impl GraphNode {
    pub fn is_table(&self) -> bool {
        self.node_type == NodeType::Table
    }

    pub fn is_field(&self) -> bool {
        self.node_type == NodeType::Field
    }

    fn from_raw(raw: &RawNode) -> Self {
        let domain_path = match raw.node_type {
            NodeType::Table => raw.raw_domain().and_then(DomainPath::parse),
            NodeType::Field => None,
        };
        Self {
            id: raw.id.clone(),
            node_type: raw.node_type,
            label: raw.label.clone().unwrap_or_else(|| raw.id.clone()),
            parent_id: raw.parent_id.clone(),
            domain_path,
            source_name: raw.source_name.clone(),
            ordinal_position: raw.ordinal_position,
        }
    }
}

/// Edge weight stored in the petgraph instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeData {
    /// Relationship id (synthesized when the backend omitted it)
    pub id: String,
    pub provenance: Provenance,
    pub confidence: Option<f64>,
}

/// A borrowed view of one raw edge with resolved endpoint ids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeView<'a> {
    pub id: &'a str,
    pub source: &'a str,
    pub target: &'a str,
    pub provenance: Provenance,
}

/// Validated lineage neighbourhood.
///
/// Invariants upheld by [`LineageGraph::from_response`]:
/// - every field's `parent_id` resolves to a table node;
/// - every edge endpoint resolves to a node;
/// - every edge has an id;
/// - the root node exists whenever `root_id` is non-empty.
#[derive(Debug, Clone)]
pub struct LineageGraph {
    graph: StableGraph<GraphNode, EdgeData, petgraph::Directed>,
    node_index_map: HashMap<String, NodeIndex>,
    root_id: String,
}

impl Default for LineageGraph {
    fn default() -> Self {
        Self {
            graph: StableGraph::new(),
            node_index_map: HashMap::new(),
            root_id: String::new(),
        }
    }
}

impl LineageGraph {
    /// Validate and index a backend response.
    ///
    /// Offending nodes and edges are dropped with a warning instead of failing,
    /// so a partially broken neighbourhood still renders.
    pub fn from_response(response: &LineageGraphResponse) -> Self {
        let mut lineage = Self {
            root_id: response.root_id.clone(),
            ..Self::default()
        };

        // Tables first so field parents can be checked in one pass
        for raw in response.nodes.iter().filter(|n| n.node_type == NodeType::Table) {
            lineage.insert_node(GraphNode::from_raw(raw));
        }

        if !lineage.root_id.is_empty() && !lineage.contains_node(&lineage.root_id) {
            debug!("Root '{}' missing from response, adding bare table", lineage.root_id);
            let root = RawNode::table(lineage.root_id.clone(), lineage.root_id.clone());
            lineage.insert_node(GraphNode::from_raw(&root));
        }

        for raw in response.nodes.iter().filter(|n| n.node_type == NodeType::Field) {
            let parent_ok = raw
                .parent_id
                .as_deref()
                .and_then(|p| lineage.get_node(p))
                .is_some_and(GraphNode::is_table);
            if !parent_ok {
                warn!(
                    "Dropping field '{}': parent {:?} is not a table in this response",
                    raw.id, raw.parent_id
                );
                continue;
            }
            lineage.insert_node(GraphNode::from_raw(raw));
        }

        for raw in &response.edges {
            let (Some(&source), Some(&target)) = (
                lineage.node_index_map.get(&raw.source_id),
                lineage.node_index_map.get(&raw.target_id),
            ) else {
                warn!(
                    "Dropping edge {:?}: endpoint '{}' or '{}' not in response",
                    raw.id, raw.source_id, raw.target_id
                );
                continue;
            };

            let id = match raw.id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => synthesize_edge_id(&raw.source_id, &raw.target_id),
            };
            lineage.graph.add_edge(
                source,
                target,
                EdgeData {
                    id,
                    provenance: raw.lineage_source.unwrap_or_default(),
                    confidence: raw.confidence,
                },
            );
        }

        debug!(
            "Loaded lineage graph: {} nodes, {} edges (root '{}')",
            lineage.node_count(),
            lineage.edge_count(),
            lineage.root_id
        );
        lineage
    }

    /// Parse and validate a JSON response body.
    pub fn from_json(json: &str) -> Result<Self, LineaError> {
        Ok(Self::from_response(&LineageGraphResponse::from_json(json)?))
    }

    /// Replace semantics: a later node with the same id wins.
    fn insert_node(&mut self, node: GraphNode) {
        if let Some(existing) = self.node_index_map.remove(&node.id) {
            self.graph.remove_node(existing);
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.node_index_map.insert(id, idx);
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_index_map.contains_key(id)
    }

    pub fn get_node(&self, id: &str) -> Option<&GraphNode> {
        self.node_index_map
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Iterate over nodes in insertion order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    /// Iterate over table nodes in insertion order.
    pub fn tables(&self) -> impl Iterator<Item = &GraphNode> {
        self.iter_nodes().filter(|n| n.is_table())
    }

    /// Fields owned by a table, ordered by ordinal position then label.
    pub fn fields_of(&self, table_id: &str) -> Vec<&GraphNode> {
        let mut fields: Vec<&GraphNode> = self
            .iter_nodes()
            .filter(|n| n.is_field() && n.parent_id.as_deref() == Some(table_id))
            .collect();
        fields.sort_by(|a, b| {
            a.ordinal_position
                .unwrap_or(i64::MAX)
                .cmp(&b.ordinal_position.unwrap_or(i64::MAX))
                .then_with(|| a.label.cmp(&b.label))
        });
        fields
    }

    /// The table that represents a node: itself for tables, its parent for fields.
    pub fn owning_table(&self, id: &str) -> Option<&GraphNode> {
        let node = self.get_node(id)?;
        match node.node_type {
            NodeType::Table => Some(node),
            NodeType::Field => node.parent_id.as_deref().and_then(|p| self.get_node(p)),
        }
    }

    /// Iterate over all edges in insertion order.
    pub fn iter_edges(&self) -> impl Iterator<Item = EdgeView<'_>> {
        self.graph.edge_references().filter_map(move |edge_ref| {
            let source = self.graph.node_weight(edge_ref.source())?;
            let target = self.graph.node_weight(edge_ref.target())?;
            let data = edge_ref.weight();
            Some(EdgeView {
                id: &data.id,
                source: &source.id,
                target: &target.id,
                provenance: data.provenance,
            })
        })
    }

    /// Find an edge by id.
    pub fn get_edge(&self, id: &str) -> Option<EdgeView<'_>> {
        self.iter_edges().find(|e| e.id == id)
    }

    /// Nodes with an edge into `id`.
    pub fn predecessors(&self, id: &str) -> impl Iterator<Item = &GraphNode> {
        self.neighbors_directed(id, Direction::Incoming)
    }

    /// Nodes with an edge out of `id`.
    pub fn successors(&self, id: &str) -> impl Iterator<Item = &GraphNode> {
        self.neighbors_directed(id, Direction::Outgoing)
    }

    fn neighbors_directed(&self, id: &str, dir: Direction) -> impl Iterator<Item = &GraphNode> {
        let idx = self.node_index_map.get(id).copied();
        idx.into_iter()
            .flat_map(move |idx| self.graph.neighbors_directed(idx, dir))
            .filter_map(move |n| self.graph.node_weight(n))
    }
}

/// Deterministic id for an edge the backend sent without one.
pub fn synthesize_edge_id(source: &str, target: &str) -> String {
    format!("e-{}-{}", source, target)
}
