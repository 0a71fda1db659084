//! Domain aggregation.
//!
//! Decides which tables are drawn on their own and which are folded into a
//! domain bucket. The result is recomputed from scratch on every pass from the
//! raw graph plus [`ProjectionState`]; nothing here is cached or mutated in place.
//!
//! Pipeline:
//! 1. adaptive activation (skip everything for small graphs);
//! 2. bridge detection on the table-level edge projection;
//! 3. per-prefix coverage accounting and auto-expansion;
//! 4. assignment of every dependent table to its shortest unexpanded prefix;
//! 5. bucket materialization (collapsed buckets and expanded shells).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::domain::DomainPath;
use crate::graph::{GraphNode, LineageGraph};
use crate::state::ProjectionState;

/// Default number of active tables above which aggregation kicks in.
pub const DEFAULT_AGGREGATION_THRESHOLD: usize = 15;

/// Prefix applied to bucket keys to form node ids.
pub const BUCKET_ID_PREFIX: &str = "bucket:";

/// Tuning knobs for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    /// Aggregation is skipped while the active table count stays at or below this
    pub threshold: usize,

    /// Render a one-member bucket as its plain table instead
    pub dissolve_single_member_buckets: bool,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_AGGREGATION_THRESHOLD,
            dissolve_single_member_buckets: false,
        }
    }
}

// ============================================================================
// Projection Output
// ============================================================================

/// A synthetic node grouping tables under a shared domain prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    /// Serialized domain prefix, unique within a projection
    pub key: String,

    #[serde(skip)]
    pub path: DomainPath,

    /// Last segment of the prefix
    pub label: String,

    /// Number of segments in the prefix
    pub level: usize,

    /// Expanded buckets are transparent containers; collapsed ones are proxies
    pub expanded: bool,

    /// Tables folded into this bucket (empty when expanded)
    pub members: Vec<String>,

    /// Every table under the prefix, folded or not
    pub total: usize,
}

impl Bucket {
    fn new(path: DomainPath, expanded: bool, members: Vec<String>, total: usize) -> Self {
        Self {
            key: path.key(),
            label: path.leaf().to_string(),
            level: path.len(),
            path,
            expanded,
            members,
            total,
        }
    }

    /// Node id used for this bucket in the rendered graph.
    pub fn node_id(&self) -> String {
        bucket_node_id(&self.key)
    }
}

/// Node id for the bucket with the given key.
pub fn bucket_node_id(key: &str) -> String {
    format!("{}{}", BUCKET_ID_PREFIX, key)
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Projection {
    /// Tables rendered as individual nodes
    pub visible_tables: BTreeSet<String>,

    /// Collapsed buckets and expanded shells, ordered by level then key
    pub buckets: Vec<Bucket>,

    /// Effective expanded prefixes (manual and automatic)
    pub expanded: BTreeSet<DomainPath>,

    /// Tables that can never be folded in this pass
    pub independent: BTreeSet<String>,

    /// Tables kept visible because they hand lineage across domains
    pub bridges: BTreeSet<String>,

    /// False when the graph was small enough to skip aggregation
    pub aggregated: bool,

    #[serde(skip)]
    bucket_index: HashMap<String, usize>,
}

impl Projection {
    fn new(
        visible_tables: BTreeSet<String>,
        mut buckets: Vec<Bucket>,
        expanded: BTreeSet<DomainPath>,
        independent: BTreeSet<String>,
        bridges: BTreeSet<String>,
        aggregated: bool,
    ) -> Self {
        buckets.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.key.cmp(&b.key)));
        let bucket_index = buckets
            .iter()
            .enumerate()
            .map(|(i, b)| (b.key.clone(), i))
            .collect();
        Self {
            visible_tables,
            buckets,
            expanded,
            independent,
            bridges,
            aggregated,
            bucket_index,
        }
    }

    pub fn is_visible(&self, table_id: &str) -> bool {
        self.visible_tables.contains(table_id)
    }

    /// Look up a bucket by key.
    pub fn bucket(&self, key: &str) -> Option<&Bucket> {
        self.bucket_index.get(key).map(|&i| &self.buckets[i])
    }

    pub fn collapsed_buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter().filter(|b| !b.expanded)
    }

    pub fn expanded_buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter().filter(|b| b.expanded)
    }

    /// The most specific collapsed bucket on `path`, walking longest prefix first.
    pub fn collapsed_bucket_for(&self, path: &DomainPath) -> Option<&Bucket> {
        path.prefixes()
            .rev()
            .find_map(|prefix| self.bucket(&prefix.key()).filter(|b| !b.expanded))
    }

    /// The collapsed bucket a table is folded into, if any.
    pub fn bucket_of(&self, table_id: &str) -> Option<&Bucket> {
        self.collapsed_buckets()
            .find(|b| b.members.iter().any(|m| m == table_id))
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Per-prefix tallies used for auto-expansion.
#[derive(Debug, Default)]
struct PrefixStats {
    total: usize,
    visible: usize,
    /// Tables whose full path is exactly this prefix
    direct: usize,
    /// Distinct next segments below this prefix
    children: BTreeSet<String>,
}

impl PrefixStats {
    /// Expanding costs nothing when every table is visible anyway, or when
    /// the prefix only passes through to a single child.
    fn auto_expands(&self) -> bool {
        self.total == self.visible || (self.direct == 0 && self.children.len() == 1)
    }
}

/// Run one aggregation pass.
pub fn project(
    graph: &LineageGraph,
    focal_id: &str,
    state: &ProjectionState,
    options: &ProjectionOptions,
) -> Projection {
    let tables: Vec<&GraphNode> = graph.tables().collect();

    // Step 1: adaptive activation
    let active = active_tables(graph, focal_id, state);
    if active.len() <= options.threshold && !state.has_manual_expansion() {
        debug!(
            "{} active tables (threshold {}), skipping aggregation",
            active.len(),
            options.threshold
        );
        let visible = tables.iter().map(|t| t.id.clone()).collect();
        return Projection::new(
            visible,
            Vec::new(),
            BTreeSet::new(),
            BTreeSet::new(),
            BTreeSet::new(),
            false,
        );
    }

    // Step 2: bridges and the rest of the independent set
    let bridges = detect_bridges(graph, focal_id);
    let traced: BTreeSet<&str> = state
        .involved_ids
        .iter()
        .filter_map(|id| graph.owning_table(id))
        .map(|t| t.id.as_str())
        .collect();

    let independent: BTreeSet<String> = tables
        .iter()
        .filter(|t| {
            let id = t.id.as_str();
            id == focal_id
                || state.extracted_table_ids.contains(id)
                || traced.contains(id)
                || bridges.contains(id)
                || t.domain_path.is_none()
        })
        .map(|t| t.id.clone())
        .collect();

    // Step 3: coverage accounting
    let mut stats: BTreeMap<DomainPath, PrefixStats> = BTreeMap::new();
    for table in &tables {
        let Some(path) = &table.domain_path else {
            continue;
        };
        let is_independent = independent.contains(&table.id);
        for prefix in path.prefixes() {
            let depth = prefix.len();
            let entry = stats.entry(prefix).or_default();
            entry.total += 1;
            if is_independent {
                entry.visible += 1;
            }
            match path.segments().get(depth) {
                Some(next) => {
                    entry.children.insert(next.clone());
                }
                None => entry.direct += 1,
            }
        }
    }

    let mut expanded: BTreeSet<DomainPath> = stats
        .iter()
        .filter(|(_, s)| s.auto_expands())
        .map(|(p, _)| p.clone())
        .collect();
    for key in &state.manual_expanded_paths {
        match DomainPath::from_key(key) {
            Some(path) => {
                expanded.insert(path);
            }
            None => warn!("Ignoring malformed expanded bucket key '{}'", key),
        }
    }

    // Step 4: assignment
    let mut visible = independent.clone();
    let mut assigned: BTreeMap<DomainPath, Vec<String>> = BTreeMap::new();
    let mut dependent_paths: Vec<&DomainPath> = Vec::new();
    for table in &tables {
        if independent.contains(&table.id) {
            continue;
        }
        let Some(path) = &table.domain_path else {
            continue;
        };
        dependent_paths.push(path);
        match path.prefixes().find(|p| !expanded.contains(p)) {
            Some(prefix) => assigned.entry(prefix).or_default().push(table.id.clone()),
            None => {
                visible.insert(table.id.clone());
            }
        }
    }

    // Step 5: materialization
    let total_under = |path: &DomainPath| stats.get(path).map_or(0, |s| s.total);
    let mut buckets = Vec::new();
    for (path, members) in assigned {
        if options.dissolve_single_member_buckets && members.len() == 1 {
            debug!("Dissolving single-member bucket '{}'", path);
            visible.extend(members);
            continue;
        }
        let total = total_under(&path);
        buckets.push(Bucket::new(path, false, members, total));
    }

    for path in &expanded {
        let ancestors_expanded = path
            .prefixes()
            .take(path.len() - 1)
            .all(|p| expanded.contains(&p));
        let has_dependents = dependent_paths.iter().any(|p| path.is_prefix_of(p));
        if ancestors_expanded && has_dependents {
            buckets.push(Bucket::new(path.clone(), true, Vec::new(), total_under(path)));
        }
    }

    let projection = Projection::new(visible, buckets, expanded, independent, bridges, true);
    debug!(
        "Aggregated {} tables: {} visible, {} collapsed buckets, {} expanded shells",
        tables.len(),
        projection.visible_tables.len(),
        projection.collapsed_buckets().count(),
        projection.expanded_buckets().count()
    );
    projection
}

/// Tables that are the focal table, traced, extracted, or touched by any edge.
fn active_tables<'a>(
    graph: &'a LineageGraph,
    focal_id: &'a str,
    state: &'a ProjectionState,
) -> BTreeSet<&'a str> {
    let seeds = std::iter::once(focal_id)
        .chain(state.involved_ids.iter().map(String::as_str))
        .chain(state.extracted_table_ids.iter().map(String::as_str))
        .chain(graph.iter_edges().flat_map(|e| [e.source, e.target]));

    seeds
        .filter_map(|id| graph.owning_table(id))
        .map(|t| t.id.as_str())
        .collect()
}

/// Tables with both upstream and downstream neighbours that sit outside the
/// focal domain and do not continue an upstream neighbour's domain.
///
/// Field edges are lifted to their owning tables; intra-table edges are ignored.
fn detect_bridges(graph: &LineageGraph, focal_id: &str) -> BTreeSet<String> {
    let mut upstream: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut has_downstream: BTreeSet<&str> = BTreeSet::new();

    for edge in graph.iter_edges() {
        let (Some(source), Some(target)) =
            (graph.owning_table(edge.source), graph.owning_table(edge.target))
        else {
            continue;
        };
        if source.id == target.id {
            continue;
        }
        has_downstream.insert(source.id.as_str());
        upstream
            .entry(target.id.as_str())
            .or_default()
            .insert(source.id.as_str());
    }

    let focal_domain = graph.get_node(focal_id).and_then(|n| n.domain_path.as_ref());
    let domain_of = |id: &str| graph.get_node(id).and_then(|n| n.domain_path.as_ref());

    let mut bridges = BTreeSet::new();
    for table in graph.tables() {
        let Some(parents) = upstream.get(table.id.as_str()) else {
            continue;
        };
        if !has_downstream.contains(table.id.as_str()) {
            continue;
        }
        let domain = table.domain_path.as_ref();
        if domain == focal_domain {
            continue;
        }
        if parents.iter().any(|p| domain_of(p) == domain) {
            continue;
        }
        bridges.insert(table.id.clone());
    }

    if !bridges.is_empty() {
        debug!("Detected {} bridge tables", bridges.len());
    }
    bridges
}
