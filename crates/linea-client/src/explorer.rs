//! Interactive lineage session.
//!
//! [`LineageExplorer`] owns the cached raw graph and the projection state of
//! one viewer. Fetches and traces are the only async suspension points; every
//! other interaction is a synchronous mutation followed by a full re-render
//! over the cached graph.
//!
//! Fetch ordering: the last-issued request is the current selection. A
//! response is installed only if its request still equals the selection when
//! it arrives; anything else is discarded as stale.

use std::sync::Arc;

use linea_core::{
    render, LineaError, LineageDirection, LineageGraph, NodeType, ProjectionState,
    RenderOptions, RenderedGraph, TraceResult,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::trace::resolve_trace;
use crate::traits::LineageApi;
use crate::types::GraphRequest;

/// What happened to a fetch once its response arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The response became the loaded graph
    Installed,
    /// The selection moved on while the request was outstanding
    Stale,
    /// An identical request was already outstanding; it is the selection
    /// again and its response will be installed
    AlreadyInFlight,
}

#[derive(Debug, Clone)]
struct LoadedGraph {
    request: GraphRequest,
    graph: Arc<LineageGraph>,
}

#[derive(Debug, Default)]
struct Session {
    /// Last-issued selection
    current: Option<GraphRequest>,
    loaded: Option<LoadedGraph>,
    projection: ProjectionState,
    in_flight: Vec<GraphRequest>,
}

/// Removes a request from the in-flight list, also when the fetch future is dropped.
struct InFlight<'a> {
    session: &'a Mutex<Session>,
    request: GraphRequest,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut session = self.session.lock();
        if let Some(pos) = session.in_flight.iter().position(|r| r == &self.request) {
            session.in_flight.remove(pos);
        }
    }
}

/// Lineage viewer session over a [`LineageApi`].
///
/// Methods take `&self`; share the explorer behind an `Arc` to drive it from
/// several tasks. The internal lock is never held across an await.
pub struct LineageExplorer<A> {
    api: A,
    options: RenderOptions,
    session: Mutex<Session>,
}

impl<A: LineageApi> LineageExplorer<A> {
    pub fn new(api: A, options: RenderOptions) -> Self {
        Self {
            api,
            options,
            session: Mutex::new(Session::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.options
    }

    /// The current selection, if any.
    pub fn current(&self) -> Option<GraphRequest> {
        self.session.lock().current.clone()
    }

    /// True while any graph fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        !self.session.lock().in_flight.is_empty()
    }

    /// The loaded graph, if any.
    pub fn graph(&self) -> Option<Arc<LineageGraph>> {
        self.session
            .lock()
            .loaded
            .as_ref()
            .map(|l| Arc::clone(&l.graph))
    }

    /// The request that produced the loaded graph.
    pub fn loaded_request(&self) -> Option<GraphRequest> {
        self.session.lock().loaded.as_ref().map(|l| l.request.clone())
    }

    pub fn projection_state(&self) -> ProjectionState {
        self.session.lock().projection.clone()
    }

    // ========================================================================
    // Fetching
    // ========================================================================

    /// Select a table and fetch its neighbourhood.
    pub async fn select_table(
        &self,
        table_id: impl Into<String>,
        direction: LineageDirection,
        depth: u32,
    ) -> Result<LoadOutcome, ClientError> {
        self.load(GraphRequest::new(table_id, direction, depth)).await
    }

    /// Make `request` the current selection and fetch it.
    ///
    /// Switching to a different table resets projection state. A failed fetch
    /// leaves the previously loaded graph in place.
    pub async fn load(&self, request: GraphRequest) -> Result<LoadOutcome, ClientError> {
        let guard = {
            let mut session = self.session.lock();
            let table_changed = session
                .current
                .as_ref()
                .is_none_or(|c| c.table_id != request.table_id);
            if table_changed {
                info!("Selected table '{}'", request.table_id);
                session.projection.reset();
            }

            // Re-issuing an outstanding request still makes it the selection
            session.current = Some(request.clone());
            if session.in_flight.contains(&request) {
                debug!("Request for '{}' already in flight", request.table_id);
                return Ok(LoadOutcome::AlreadyInFlight);
            }
            session.in_flight.push(request.clone());
            InFlight {
                session: &self.session,
                request: request.clone(),
            }
        };

        let result = self.api.fetch_graph(&request).await;
        drop(guard);

        let mut session = self.session.lock();
        if session.current.as_ref() != Some(&request) {
            debug!(
                "Discarding stale response for '{}' ({}, depth {})",
                request.table_id, request.direction, request.depth
            );
            return Ok(LoadOutcome::Stale);
        }

        let mut response = result.inspect_err(|e| {
            warn!("Fetch of '{}' failed, keeping previous graph: {}", request.table_id, e);
        })?;
        if response.root_id.is_empty() {
            response.root_id = request.table_id.clone();
        }

        let graph = LineageGraph::from_response(&response);
        info!(
            "Loaded '{}': {} nodes, {} edges",
            request.table_id,
            graph.node_count(),
            graph.edge_count()
        );
        session.loaded = Some(LoadedGraph {
            request,
            graph: Arc::new(graph),
        });
        Ok(LoadOutcome::Installed)
    }

    /// Re-fetch the current selection.
    pub async fn reload(&self) -> Result<LoadOutcome, ClientError> {
        let current = self.current().ok_or(ClientError::NothingLoaded)?;
        self.load(current).await
    }

    /// Change the traversal direction and re-fetch.
    ///
    /// Rejected with [`ClientError::Busy`] while a fetch is outstanding.
    pub async fn set_direction(
        &self,
        direction: LineageDirection,
    ) -> Result<LoadOutcome, ClientError> {
        let current = self.idle_selection()?;
        self.load(current.with_direction(direction)).await
    }

    /// Change the traversal depth and re-fetch.
    ///
    /// Rejected with [`ClientError::Busy`] while a fetch is outstanding.
    pub async fn set_depth(&self, depth: u32) -> Result<LoadOutcome, ClientError> {
        if depth == 0 {
            return Err(
                linea_config::ConfigError::invalid_value("depth", "must be at least 1").into(),
            );
        }
        let current = self.idle_selection()?;
        self.load(current.with_depth(depth)).await
    }

    fn idle_selection(&self) -> Result<GraphRequest, ClientError> {
        let session = self.session.lock();
        if !session.in_flight.is_empty() {
            return Err(ClientError::Busy);
        }
        session.current.clone().ok_or(ClientError::NothingLoaded)
    }

    // ========================================================================
    // Local interactions
    // ========================================================================

    pub fn expand_bucket(&self, key: &str) -> Result<(), ClientError> {
        self.session.lock().projection.expand_bucket(key)?;
        Ok(())
    }

    /// Collapse a bucket and every expanded bucket nested below it.
    ///
    /// Prefixes that auto-expand stay expanded; see
    /// [`ProjectionState::collapse_bucket`].
    pub fn collapse_bucket(&self, key: &str) -> Result<(), ClientError> {
        self.session.lock().projection.collapse_bucket(key)?;
        Ok(())
    }

    /// Pull a table out of its bucket so it renders on its own.
    pub fn extract_table(&self, table_id: &str) -> Result<(), ClientError> {
        let mut session = self.session.lock();
        let loaded = session.loaded.as_ref().ok_or(ClientError::NothingLoaded)?;
        let node = loaded
            .graph
            .get_node(table_id)
            .ok_or_else(|| LineaError::node_not_found(table_id))?;
        if node.node_type != NodeType::Table {
            return Err(LineaError::wrong_node_type(
                table_id,
                NodeType::Table.as_str(),
                node.node_type.as_str(),
            )
            .into());
        }
        session.projection.extract_table(table_id);
        Ok(())
    }

    pub fn clear_trace(&self) {
        self.session.lock().projection.clear_trace();
    }

    /// Trace a field and highlight everything connected to it.
    ///
    /// Uses the service when it answers and the loaded graph otherwise. The
    /// result is applied only if the selection did not change meanwhile.
    pub async fn trace_field(&self, field_id: &str) -> TraceResult {
        let (selection, graph) = {
            let session = self.session.lock();
            (
                session.current.clone(),
                session.loaded.as_ref().map(|l| Arc::clone(&l.graph)),
            )
        };

        let result = resolve_trace(&self.api, graph.as_deref(), field_id).await;

        let mut session = self.session.lock();
        if session.current == selection {
            session.projection.apply_trace(&result);
        } else {
            debug!("Selection changed during trace of '{}', not applying", field_id);
        }
        result
    }

    /// Stage deletion of a raw lineage edge.
    ///
    /// Nothing happens until [`PendingDeletion::confirm`] is called.
    pub fn delete_edge(&self, edge_id: &str) -> Result<PendingDeletion<'_, A>, ClientError> {
        let session = self.session.lock();
        let loaded = session.loaded.as_ref().ok_or(ClientError::NothingLoaded)?;
        let edge = loaded
            .graph
            .get_edge(edge_id)
            .ok_or_else(|| ClientError::UnknownEdge(edge_id.to_string()))?;

        Ok(PendingDeletion {
            explorer: self,
            edge_id: edge.id.to_string(),
            source: edge.source.to_string(),
            target: edge.target.to_string(),
        })
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render the loaded graph under the current projection state.
    ///
    /// Empty when nothing is loaded.
    pub fn render(&self) -> RenderedGraph {
        let session = self.session.lock();
        match session.loaded {
            Some(ref loaded) => render(
                &loaded.graph,
                &loaded.request.table_id,
                &session.projection,
                &self.options,
            ),
            None => RenderedGraph::default(),
        }
    }
}

impl<A> std::fmt::Debug for LineageExplorer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.session.lock();
        f.debug_struct("LineageExplorer")
            .field("current", &session.current)
            .field("loaded", &session.loaded.as_ref().map(|l| &l.request))
            .field("in_flight", &session.in_flight.len())
            .finish()
    }
}

/// An edge deletion awaiting confirmation.
#[must_use = "a pending deletion does nothing until confirmed"]
pub struct PendingDeletion<'a, A> {
    explorer: &'a LineageExplorer<A>,
    edge_id: String,
    source: String,
    target: String,
}

impl<A: LineageApi> PendingDeletion<'_, A> {
    pub fn edge_id(&self) -> &str {
        &self.edge_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Delete the relationship on the service, then re-fetch the selection.
    ///
    /// On failure nothing changes locally.
    pub async fn confirm(self) -> Result<LoadOutcome, ClientError> {
        self.explorer.api.delete_relationship(&self.edge_id).await?;
        info!(
            "Deleted lineage '{}' ({} -> {})",
            self.edge_id, self.source, self.target
        );
        self.explorer.reload().await
    }

    pub fn cancel(self) {
        debug!("Deletion of '{}' cancelled", self.edge_id);
    }
}
