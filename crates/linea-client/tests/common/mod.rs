//! Common test utilities for client integration tests.
//!
//! [`FakeLineageApi`] is an in-memory lineage service whose fetches can be
//! held open to exercise staleness and the loading gate.

#![allow(dead_code)]

use async_trait::async_trait;
use linea_client::{ClientError, GraphRequest, LineageApi, TablePage, TableSummary};
use linea_core::{LineageGraphResponse, RawEdge, RawNode, TraceResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Default)]
pub struct FakeLineageApi {
    graphs: Mutex<HashMap<String, LineageGraphResponse>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    trace: Mutex<Option<TraceResult>>,
    pub fetches: Mutex<Vec<GraphRequest>>,
    pub deleted: Mutex<Vec<String>>,
    pub trace_calls: AtomicUsize,
    pub fail_fetch: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FakeLineageApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_graph(self: Arc<Self>, response: LineageGraphResponse) -> Arc<Self> {
        let table_id = response.root_id.clone();
        self.with_graph_for(&table_id, response)
    }

    /// Serve `response` for fetches of `table_id`.
    pub fn with_graph_for(self: Arc<Self>, table_id: &str, response: LineageGraphResponse) -> Arc<Self> {
        self.graphs.lock().insert(table_id.to_string(), response);
        self
    }

    /// Answer trace requests with `result` instead of failing.
    pub fn serve_trace(&self, result: TraceResult) {
        *self.trace.lock() = Some(result);
    }

    /// Hold fetches of `table_id` until the returned handle is notified.
    pub fn hold(&self, table_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(table_id.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().len()
    }
}

#[async_trait]
impl LineageApi for FakeLineageApi {
    async fn fetch_graph(
        &self,
        request: &GraphRequest,
    ) -> Result<LineageGraphResponse, ClientError> {
        self.fetches.lock().push(request.clone());

        let gate = self.gates.lock().remove(&request.table_id);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ClientError::server(503, "unavailable"));
        }
        self.graphs
            .lock()
            .get(&request.table_id)
            .cloned()
            .ok_or_else(|| ClientError::not_found(format!("/lineage/table/{}", request.table_id)))
    }

    async fn trace_field(&self, _field_id: &str) -> Result<TraceResult, ClientError> {
        self.trace_calls.fetch_add(1, Ordering::SeqCst);
        self.trace
            .lock()
            .clone()
            .ok_or_else(|| ClientError::server(500, "trace unavailable"))
    }

    async fn delete_relationship(&self, relationship_id: &str) -> Result<(), ClientError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ClientError::not_found(format!("/lineage/{}", relationship_id)));
        }
        self.deleted.lock().push(relationship_id.to_string());
        Ok(())
    }

    async fn list_tables(&self, page: u64, size: u64) -> Result<TablePage, ClientError> {
        let mut ids: Vec<String> = self.graphs.lock().keys().cloned().collect();
        ids.sort();
        let items = ids
            .into_iter()
            .map(|id| TableSummary {
                name: id.clone(),
                id,
                source_id: None,
                source_name: None,
                schema_name: None,
                qualified_name: None,
                field_count: None,
            })
            .collect::<Vec<_>>();
        Ok(TablePage {
            total: items.len() as u64,
            page,
            size,
            items,
        })
    }
}

/// `orders` (Finance) fed by 18 `Sales-Orders` tables, with one field edge
/// `so0.amount -> orders.amount` (id `rf`). Table edges are `r0..r17`.
pub fn sales_response() -> LineageGraphResponse {
    let mut nodes = vec![
        RawNode::table("orders", "orders").with_domain("Finance"),
        RawNode::field("orders.amount", "amount", "orders"),
    ];
    let mut edges = Vec::new();
    for i in 0..18 {
        let id = format!("so{}", i);
        nodes.push(RawNode::table(&id, &id).with_domain("Sales-Orders"));
        edges.push(RawEdge::new(&id, "orders").with_id(format!("r{}", i)));
    }
    nodes.push(RawNode::field("so0.amount", "amount", "so0"));
    edges.push(RawEdge::new("so0.amount", "orders.amount").with_id("rf"));

    LineageGraphResponse {
        root_id: "orders".to_string(),
        nodes,
        edges,
    }
}

/// A two-table graph rooted at `root_id`.
pub fn small_response(root_id: &str) -> LineageGraphResponse {
    let other = format!("{}-src", root_id);
    LineageGraphResponse {
        root_id: root_id.to_string(),
        nodes: vec![RawNode::table(root_id, root_id), RawNode::table(&other, &other)],
        edges: vec![RawEdge::new(&other, root_id).with_id(format!("{}-edge", root_id))],
    }
}
