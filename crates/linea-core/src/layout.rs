//! Layered layout with nested containers.
//!
//! Each container (and finally the top level) is laid out on its own with a
//! Sugiyama-style pipeline:
//!
//! 1. cycle removal via petgraph's greedy feedback arc set;
//! 2. longest-path rank assignment;
//! 3. virtual nodes on edges spanning several ranks;
//! 4. barycenter crossing minimisation (bounded sweeps, best ordering kept);
//! 5. coordinate assignment, ranks along the flow axis, centred across it.
//!
//! Containers are processed deepest first so a container's size is known by
//! the time its own parent is laid out. Positions of contained nodes are
//! relative to the container's origin.

use petgraph::algo::{greedy_feedback_arc_set, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Upper bound on barycenter sweeps per level.
const MAX_SWEEPS: usize = 24;

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn offset(self, by: Point) -> Self {
        Self::new(self.x + by.x, self.y + by.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Direction lineage flows across the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FlowDirection {
    #[default]
    #[serde(rename = "LR", alias = "left_to_right")]
    LeftToRight,
    #[serde(rename = "RL", alias = "right_to_left")]
    RightToLeft,
}

impl FlowDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowDirection::LeftToRight => "LR",
            FlowDirection::RightToLeft => "RL",
        }
    }
}

/// Spacing and nominal sizes used by the layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub flow: FlowDirection,
    pub table_size: Size,
    pub bucket_size: Size,
    /// Margin between a container's border and its children
    pub container_padding: f64,
    /// Extra top space reserved for a container's title
    pub container_header: f64,
    /// Gap between consecutive ranks along the flow axis
    pub rank_separation: f64,
    /// Gap between nodes within one rank
    pub node_separation: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            flow: FlowDirection::LeftToRight,
            table_size: Size::new(260.0, 120.0),
            bucket_size: Size::new(220.0, 80.0),
            container_padding: 24.0,
            container_header: 32.0,
            rank_separation: 80.0,
            node_separation: 40.0,
        }
    }
}

// ============================================================================
// Input and Output
// ============================================================================

/// A node to lay out.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub id: String,
    /// Enclosing container, if any
    pub parent: Option<String>,
    /// Fixed size; `None` for containers sized from their children
    pub size: Option<Size>,
}

impl LayoutNode {
    pub fn fixed(id: impl Into<String>, size: Size) -> Self {
        Self {
            id: id.into(),
            parent: None,
            size: Some(size),
        }
    }

    pub fn container(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            size: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// A directed edge between layout node ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEdge {
    pub source: String,
    pub target: String,
}

impl LayoutEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A node with its final geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Top-left corner relative to the parent container (absolute at top level)
    pub position: Point,
    /// Top-left corner on the canvas
    pub absolute: Point,
    pub size: Size,
}

/// Result of [`layout`]. Containers always precede their children.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    pub nodes: Vec<PositionedNode>,
    pub width: f64,
    pub height: f64,
}

impl Layout {
    pub fn get(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Anchor points of a field on its table, relative to the table's origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandleAnchor {
    pub field_id: String,
    /// Where incoming edges attach
    pub target: Point,
    /// Where outgoing edges attach
    pub source: Point,
}

/// Spread field handles evenly along the table's height, in field order.
///
/// Incoming edges attach on the upstream side, outgoing on the downstream side.
pub fn field_anchors<'a, I>(field_ids: I, size: Size, flow: FlowDirection) -> Vec<HandleAnchor>
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: ExactSizeIterator,
{
    let ids = field_ids.into_iter();
    let slots = ids.len() as f64 + 1.0;
    let (target_x, source_x) = match flow {
        FlowDirection::LeftToRight => (0.0, size.width),
        FlowDirection::RightToLeft => (size.width, 0.0),
    };

    ids.enumerate()
        .map(|(i, id)| {
            let y = size.height * (i as f64 + 1.0) / slots;
            HandleAnchor {
                field_id: id.to_string(),
                target: Point::new(target_x, y),
                source: Point::new(source_x, y),
            }
        })
        .collect()
}

// ============================================================================
// Compound Layout
// ============================================================================

/// Lay out a (possibly nested) graph.
///
/// Unknown parents and parent cycles are ignored with a warning; edges with
/// unknown endpoints and self-loops are skipped. Never fails.
pub fn layout(nodes: &[LayoutNode], edges: &[LayoutEdge], options: &LayoutOptions) -> Layout {
    if nodes.is_empty() {
        return Layout::default();
    }
    let n = nodes.len();

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(n);
    for (i, node) in nodes.iter().enumerate() {
        if index.insert(node.id.as_str(), i).is_some() {
            warn!("Duplicate layout node '{}', later entry wins", node.id);
        }
    }

    let parent = resolve_parents(nodes, &index);
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots = Vec::new();
    for i in 0..n {
        if index.get(nodes[i].id.as_str()) != Some(&i) {
            continue;
        }
        match parent[i] {
            Some(p) => children[p].push(i),
            None => roots.push(i),
        }
    }

    let depth: Vec<usize> = (0..n)
        .map(|i| ancestors(&parent, i).count())
        .collect();

    let edges: Vec<(usize, usize)> = edges
        .iter()
        .filter_map(|e| {
            let s = *index.get(e.source.as_str())?;
            let t = *index.get(e.target.as_str())?;
            (s != t).then_some((s, t))
        })
        .collect();

    let mut sizes: Vec<Size> = nodes.iter().map(|n| n.size.unwrap_or_default()).collect();
    let mut relative: Vec<Point> = vec![Point::ORIGIN; n];

    let mut containers: Vec<usize> = (0..n)
        .filter(|&i| !children[i].is_empty() || nodes[i].size.is_none())
        .collect();
    containers.sort_by_key(|&i| Reverse(depth[i]));

    let inset = Point::new(
        options.container_padding,
        options.container_header + options.container_padding,
    );
    for c in containers {
        let level = layout_level(&children[c], Some(c), &parent, &sizes, &edges, options);
        sizes[c] = Size::new(
            level.width + 2.0 * options.container_padding,
            level.height + options.container_header + 2.0 * options.container_padding,
        );
        for (&child, &pos) in children[c].iter().zip(&level.positions) {
            relative[child] = pos.offset(inset);
        }
    }

    let top = layout_level(&roots, None, &parent, &sizes, &edges, options);
    for (&root, &pos) in roots.iter().zip(&top.positions) {
        relative[root] = pos;
    }

    // Parents first, iteratively
    let mut absolute: Vec<Point> = vec![Point::ORIGIN; n];
    let mut ordered = Vec::with_capacity(n);
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        absolute[i] = match parent[i] {
            Some(p) => relative[i].offset(absolute[p]),
            None => relative[i],
        };
        ordered.push(PositionedNode {
            id: nodes[i].id.clone(),
            parent: parent[i].map(|p| nodes[p].id.clone()),
            position: relative[i],
            absolute: absolute[i],
            size: sizes[i],
        });
        stack.extend(children[i].iter().rev());
    }

    debug!(
        "Laid out {} nodes ({} top level), canvas {:.0}x{:.0}",
        ordered.len(),
        roots.len(),
        top.width,
        top.height
    );
    Layout {
        nodes: ordered,
        width: top.width,
        height: top.height,
    }
}

/// Map parent ids to indices, dropping unknown parents and breaking cycles.
fn resolve_parents(nodes: &[LayoutNode], index: &HashMap<&str, usize>) -> Vec<Option<usize>> {
    let n = nodes.len();
    let mut parent: Vec<Option<usize>> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let id = node.parent.as_deref()?;
            match index.get(id) {
                Some(&p) if p != i => Some(p),
                _ => {
                    warn!("Layout node '{}' has unknown parent '{}'", node.id, id);
                    None
                }
            }
        })
        .collect();

    for i in 0..n {
        let mut steps = 0;
        let mut current = i;
        while let Some(p) = parent[current] {
            steps += 1;
            if steps > n {
                warn!("Parent cycle through '{}', detaching it", nodes[i].id);
                parent[i] = None;
                break;
            }
            current = p;
        }
    }
    parent
}

fn ancestors(parent: &[Option<usize>], node: usize) -> impl Iterator<Item = usize> + '_ {
    std::iter::successors(parent[node], move |&p| parent[p])
}

/// The ancestor-or-self of `node` whose parent is `container`.
fn lift(parent: &[Option<usize>], node: usize, container: Option<usize>) -> Option<usize> {
    let mut current = node;
    loop {
        if parent[current] == container {
            return Some(current);
        }
        current = parent[current]?;
    }
}

// ============================================================================
// Single Level Layout
// ============================================================================

#[derive(Debug, Default)]
struct LevelLayout {
    /// Top-left of each member, in member order
    positions: Vec<Point>,
    width: f64,
    height: f64,
}

/// Lay out the direct members of one container (or the top level).
fn layout_level(
    members: &[usize],
    container: Option<usize>,
    parent: &[Option<usize>],
    sizes: &[Size],
    edges: &[(usize, usize)],
    options: &LayoutOptions,
) -> LevelLayout {
    if members.is_empty() {
        return LevelLayout::default();
    }

    let local: HashMap<usize, usize> = members.iter().enumerate().map(|(k, &m)| (m, k)).collect();
    let mut local_edges = Vec::new();
    let mut seen = HashSet::new();
    for &(s, t) in edges {
        let (Some(ls), Some(lt)) = (
            lift(parent, s, container).and_then(|x| local.get(&x)),
            lift(parent, t, container).and_then(|x| local.get(&x)),
        ) else {
            continue;
        };
        if ls != lt && seen.insert((*ls, *lt)) {
            local_edges.push((*ls, *lt));
        }
    }

    let item_sizes: Vec<Size> = members.iter().map(|&m| sizes[m]).collect();
    let ranks = assign_ranks(members.len(), &local_edges);
    let mut layered = LayeredGraph::build(&ranks, &local_edges);
    layered.minimise_crossings();
    layered.assign_coordinates(&item_sizes, options)
}

/// Longest-path ranks after making the graph acyclic.
fn assign_ranks(count: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(count, edges.len());
    for _ in 0..count {
        graph.add_node(());
    }
    for &(s, t) in edges {
        graph.add_edge(NodeIndex::new(s), NodeIndex::new(t), ());
    }

    let feedback: HashSet<_> = greedy_feedback_arc_set(&graph).map(|e| e.id()).collect();
    if !feedback.is_empty() {
        debug!("Reversing {} edges to break cycles", feedback.len());
    }

    let mut dag: DiGraph<(), ()> = DiGraph::with_capacity(count, edges.len());
    for _ in 0..count {
        dag.add_node(());
    }
    for edge in graph.edge_references() {
        let (s, t) = (edge.source(), edge.target());
        if feedback.contains(&edge.id()) {
            dag.update_edge(t, s, ());
        } else {
            dag.update_edge(s, t, ());
        }
    }

    let order = match toposort(&dag, None) {
        Ok(order) => order,
        Err(cycle) => {
            warn!("Cycle left at node {:?} after reversal, using input order", cycle.node_id());
            dag.node_indices().collect()
        }
    };

    let mut ranks = vec![0usize; count];
    for node in order {
        let rank = ranks[node.index()];
        for next in dag.neighbors(node) {
            ranks[next.index()] = ranks[next.index()].max(rank + 1);
        }
    }
    ranks
}

/// Proper layered graph: every edge spans exactly one rank.
///
/// Slots `0..real` are the level's members; the rest are virtual nodes.
struct LayeredGraph {
    real: usize,
    layers: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    successors: Vec<Vec<usize>>,
}

impl LayeredGraph {
    fn build(ranks: &[usize], edges: &[(usize, usize)]) -> Self {
        let real = ranks.len();
        let layer_count = ranks.iter().max().map_or(0, |r| r + 1);
        let mut slot_rank: Vec<usize> = ranks.to_vec();
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); real];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); real];

        fn link(from: usize, to: usize, pred: &mut [Vec<usize>], succ: &mut [Vec<usize>]) {
            succ[from].push(to);
            pred[to].push(from);
        }

        for &(s, t) in edges {
            // Edges into lower ranks were reversed during ranking
            let (s, t) = if ranks[s] <= ranks[t] { (s, t) } else { (t, s) };
            let mut previous = s;
            for rank in ranks[s] + 1..ranks[t] {
                let slot = slot_rank.len();
                slot_rank.push(rank);
                predecessors.push(Vec::new());
                successors.push(Vec::new());
                link(previous, slot, &mut predecessors, &mut successors);
                previous = slot;
            }
            link(previous, t, &mut predecessors, &mut successors);
        }

        let mut layers: Vec<Vec<usize>> = vec![Vec::new(); layer_count];
        for (slot, &rank) in slot_rank.iter().enumerate() {
            layers[rank].push(slot);
        }

        Self {
            real,
            layers,
            predecessors,
            successors,
        }
    }

    fn is_virtual(&self, slot: usize) -> bool {
        slot >= self.real
    }

    /// Alternate down and up barycenter sweeps, keeping the best ordering.
    fn minimise_crossings(&mut self) {
        let mut best = self.layers.clone();
        let mut best_crossings = self.count_crossings();

        for _ in 0..MAX_SWEEPS {
            if best_crossings == 0 {
                break;
            }
            for layer in 1..self.layers.len() {
                self.reorder(layer, layer - 1, true);
            }
            for layer in (0..self.layers.len().saturating_sub(1)).rev() {
                self.reorder(layer, layer + 1, false);
            }

            let crossings = self.count_crossings();
            if crossings >= best_crossings {
                break;
            }
            best_crossings = crossings;
            best = self.layers.clone();
        }
        self.layers = best;
    }

    /// Sort `layer` by the mean position of its neighbours in `fixed`.
    ///
    /// Slots without neighbours there keep their current position as key.
    fn reorder(&mut self, layer: usize, fixed: usize, downward: bool) {
        let position: HashMap<usize, f64> = self.layers[fixed]
            .iter()
            .enumerate()
            .map(|(i, &slot)| (slot, i as f64))
            .collect();

        let keys: HashMap<usize, f64> = self.layers[layer]
            .iter()
            .enumerate()
            .map(|(current, &slot)| {
                let neighbours = if downward {
                    &self.predecessors[slot]
                } else {
                    &self.successors[slot]
                };
                let found: Vec<f64> = neighbours
                    .iter()
                    .filter_map(|n| position.get(n).copied())
                    .collect();
                let key = if found.is_empty() {
                    current as f64
                } else {
                    found.iter().sum::<f64>() / found.len() as f64
                };
                (slot, key)
            })
            .collect();

        self.layers[layer].sort_by(|a, b| keys[a].total_cmp(&keys[b]));
    }

    fn count_crossings(&self) -> usize {
        let mut total = 0;
        for pair in self.layers.windows(2) {
            let lower: HashMap<usize, usize> =
                pair[1].iter().enumerate().map(|(i, &s)| (s, i)).collect();
            let mut segments: Vec<(usize, usize)> = Vec::new();
            for (i, &slot) in pair[0].iter().enumerate() {
                for next in &self.successors[slot] {
                    if let Some(&j) = lower.get(next) {
                        segments.push((i, j));
                    }
                }
            }
            for (a, &(a0, a1)) in segments.iter().enumerate() {
                for &(b0, b1) in &segments[a + 1..] {
                    if (a0 < b0 && a1 > b1) || (a0 > b0 && a1 < b1) {
                        total += 1;
                    }
                }
            }
        }
        total
    }

    /// Ranks become columns along the flow axis; each column is centred
    /// across it. Virtual slots take no space beyond the node separation.
    fn assign_coordinates(&self, sizes: &[Size], options: &LayoutOptions) -> LevelLayout {
        let size_of = |slot: usize| {
            if self.is_virtual(slot) {
                Size::default()
            } else {
                sizes[slot]
            }
        };

        let column_widths: Vec<f64> = self
            .layers
            .iter()
            .map(|layer| layer.iter().map(|&s| size_of(s).width).fold(0.0, f64::max))
            .collect();
        let column_heights: Vec<f64> = self
            .layers
            .iter()
            .map(|layer| {
                let nodes: f64 = layer.iter().map(|&s| size_of(s).height).sum();
                nodes + options.node_separation * layer.len().saturating_sub(1) as f64
            })
            .collect();

        let height = column_heights.iter().copied().fold(0.0, f64::max);
        let width = column_widths.iter().sum::<f64>()
            + options.rank_separation * column_widths.len().saturating_sub(1) as f64;

        let mut positions = vec![Point::ORIGIN; self.real];
        let mut column_x = 0.0;
        for (rank, layer) in self.layers.iter().enumerate() {
            let mut y = (height - column_heights[rank]) / 2.0;
            for &slot in layer {
                let size = size_of(slot);
                if !self.is_virtual(slot) {
                    let x = column_x + (column_widths[rank] - size.width) / 2.0;
                    let x = match options.flow {
                        FlowDirection::LeftToRight => x,
                        FlowDirection::RightToLeft => width - x - size.width,
                    };
                    positions[slot] = Point::new(x, y);
                }
                y += size.height + options.node_separation;
            }
            column_x += column_widths[rank] + options.rank_separation;
        }

        LevelLayout {
            positions,
            width,
            height,
        }
    }
}
