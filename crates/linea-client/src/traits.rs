//! Lineage service trait definition.

use async_trait::async_trait;
use linea_core::{LineageGraphResponse, TraceResult};
use std::sync::Arc;

use crate::error::ClientError;
use crate::types::{GraphRequest, TablePage};

/// The lineage service endpoints the viewer consumes.
///
/// All operations are async; implementations must be shareable across tasks.
#[async_trait]
pub trait LineageApi: Send + Sync {
    /// Fetch the lineage neighbourhood of a table.
    async fn fetch_graph(&self, request: &GraphRequest)
        -> Result<LineageGraphResponse, ClientError>;

    /// Ask the service for the fields and tables connected to `field_id`.
    async fn trace_field(&self, field_id: &str) -> Result<TraceResult, ClientError>;

    /// Delete a lineage relationship by id.
    async fn delete_relationship(&self, relationship_id: &str) -> Result<(), ClientError>;

    /// List one page of tables (1-based `page`).
    async fn list_tables(&self, page: u64, size: u64) -> Result<TablePage, ClientError>;
}

#[async_trait]
impl<T: LineageApi + ?Sized> LineageApi for Arc<T> {
    async fn fetch_graph(
        &self,
        request: &GraphRequest,
    ) -> Result<LineageGraphResponse, ClientError> {
        (**self).fetch_graph(request).await
    }

    async fn trace_field(&self, field_id: &str) -> Result<TraceResult, ClientError> {
        (**self).trace_field(field_id).await
    }

    async fn delete_relationship(&self, relationship_id: &str) -> Result<(), ClientError> {
        (**self).delete_relationship(relationship_id).await
    }

    async fn list_tables(&self, page: u64, size: u64) -> Result<TablePage, ClientError> {
        (**self).list_tables(page, size).await
    }
}
