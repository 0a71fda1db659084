//! Common test utilities for integration tests.
//!
//! Builders for synthetic lineage neighbourhoods and the invariant checks
//! shared across projection and layout tests.

#![allow(dead_code)]

use linea_core::{LineageGraph, LineageGraphResponse, Projection, RawEdge, RawNode};
use std::collections::BTreeMap;

/// Fluent builder for lineage responses.
pub struct GraphBuilder {
    response: LineageGraphResponse,
}

impl GraphBuilder {
    pub fn new(root_id: &str) -> Self {
        Self {
            response: LineageGraphResponse {
                root_id: root_id.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn table(mut self, id: &str, domain: Option<&str>) -> Self {
        let mut node = RawNode::table(id, id);
        if let Some(domain) = domain {
            node = node.with_domain(domain);
        }
        self.response.nodes.push(node);
        self
    }

    /// `count` tables named `{prefix}{i}` under `domain`.
    pub fn tables(mut self, prefix: &str, count: usize, domain: &str) -> Self {
        for i in 0..count {
            self = self.table(&format!("{}{}", prefix, i), Some(domain));
        }
        self
    }

    pub fn field(mut self, id: &str, table: &str) -> Self {
        self.response.nodes.push(RawNode::field(id, id, table));
        self
    }

    pub fn edge(mut self, source: &str, target: &str) -> Self {
        self.response.edges.push(RawEdge::new(source, target));
        self
    }

    /// Edges from every `{prefix}{i}` table into `target`.
    pub fn fan_in(mut self, prefix: &str, count: usize, target: &str) -> Self {
        for i in 0..count {
            self = self.edge(&format!("{}{}", prefix, i), target);
        }
        self
    }

    pub fn response(self) -> LineageGraphResponse {
        self.response
    }

    pub fn build(self) -> LineageGraph {
        LineageGraph::from_response(&self.response)
    }
}

/// Focal table plus `others` Sales tables feeding it.
pub fn fan_in_graph(others: usize) -> LineageGraph {
    GraphBuilder::new("focal")
        .table("focal", Some("Finance"))
        .tables("s", others, "Sales")
        .fan_in("s", others, "focal")
        .build()
}

/// 20 tables: 18 under `Sales-Orders` feeding a Marketing table that hands
/// their lineage on to the focal Finance table.
pub fn sales_orders_graph() -> LineageGraph {
    GraphBuilder::new("focal")
        .table("focal", Some("Finance"))
        .table("campaigns", Some("Marketing-Campaigns"))
        .tables("so", 18, "Sales-Orders")
        .fan_in("so", 18, "campaigns")
        .edge("campaigns", "focal")
        .build()
}

/// Focal Finance table fed by 16 `Sales-Orders` tables and 3 tables tagged
/// with plain `Sales`.
pub fn nested_sales_graph() -> LineageGraph {
    GraphBuilder::new("focal")
        .table("focal", Some("Finance"))
        .tables("so", 16, "Sales-Orders")
        .tables("sd", 3, "Sales")
        .fan_in("so", 16, "focal")
        .fan_in("sd", 3, "focal")
        .build()
}

/// Every table must appear exactly once across visible tables and bucket members.
pub fn assert_coverage(graph: &LineageGraph, projection: &Projection) {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for id in &projection.visible_tables {
        *seen.entry(id.as_str()).or_default() += 1;
    }
    for bucket in &projection.buckets {
        if bucket.expanded {
            assert!(bucket.members.is_empty(), "expanded bucket {} has members", bucket.key);
        }
        for id in &bucket.members {
            *seen.entry(id.as_str()).or_default() += 1;
        }
    }

    for table in graph.tables() {
        assert_eq!(
            seen.get(table.id.as_str()).copied(),
            Some(1),
            "table {} must be covered exactly once",
            table.id
        );
    }
    assert_eq!(seen.len(), graph.tables().count(), "projection invented tables");
}
