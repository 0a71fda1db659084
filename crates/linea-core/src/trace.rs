//! Field-level lineage tracing.
//!
//! A trace highlights every field and table transitively connected to a chosen
//! field. The backend can compute it directly; [`trace_locally`] is the fallback
//! used when that call fails, computed over the currently loaded raw edges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::graph::{LineageGraph, NodeType};

/// Result of a field trace: the highlight set used by aggregation and edge styling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceResult {
    #[serde(default)]
    pub involved_fields: BTreeSet<String>,

    #[serde(default)]
    pub involved_tables: BTreeSet<String>,
}

impl TraceResult {
    pub fn is_empty(&self) -> bool {
        self.involved_fields.is_empty() && self.involved_tables.is_empty()
    }

    /// Union of involved fields and tables.
    pub fn involved_ids(&self) -> BTreeSet<String> {
        self.involved_fields
            .iter()
            .chain(&self.involved_tables)
            .cloned()
            .collect()
    }
}

/// Compute the undirected transitive closure of `field_id` over the raw edges.
///
/// Fixed-point iteration: every pass scans all edges and pulls in the other
/// endpoint of any edge touching the set, until a full pass adds nothing.
/// Closure members that are tables land in `involved_tables`; fields land in
/// `involved_fields` and also contribute their owning table.
///
/// Returns an empty result when the graph is empty (nothing loaded yet).
pub fn trace_locally(graph: &LineageGraph, field_id: &str) -> TraceResult {
    if graph.is_empty() {
        debug!("No graph loaded, trace of '{}' is empty", field_id);
        return TraceResult::default();
    }

    let mut closure: BTreeSet<String> = BTreeSet::new();
    closure.insert(field_id.to_string());

    let mut passes = 0usize;
    loop {
        passes += 1;
        let before = closure.len();
        for edge in graph.iter_edges() {
            if closure.contains(edge.source) {
                closure.insert(edge.target.to_string());
            }
            if closure.contains(edge.target) {
                closure.insert(edge.source.to_string());
            }
        }
        if closure.len() == before {
            break;
        }
    }

    let mut result = TraceResult::default();
    for id in closure {
        match graph.get_node(&id).map(|n| (n.node_type, n.parent_id.clone())) {
            Some((NodeType::Table, _)) => {
                result.involved_tables.insert(id);
            }
            Some((NodeType::Field, parent)) => {
                if let Some(parent) = parent {
                    result.involved_tables.insert(parent);
                }
                result.involved_fields.insert(id);
            }
            // Unknown seed id: keep it so the caller still sees what was asked for
            None => {
                result.involved_fields.insert(id);
            }
        }
    }

    debug!(
        "Local trace of '{}': {} fields, {} tables in {} passes",
        field_id,
        result.involved_fields.len(),
        result.involved_tables.len(),
        passes
    );
    result
}
