//! Field-trace resolution: service first, local closure as fallback.

use linea_core::{trace_locally, LineageGraph, TraceResult};
use tracing::{debug, warn};

use crate::traits::LineageApi;

/// Resolve the trace of `field_id`.
///
/// Asks the service first. On any error falls back to the local closure over
/// `graph`; with no graph loaded the result is empty. Never fails.
pub async fn resolve_trace<A>(api: &A, graph: Option<&LineageGraph>, field_id: &str) -> TraceResult
where
    A: LineageApi + ?Sized,
{
    match api.trace_field(field_id).await {
        Ok(result) => {
            debug!(
                "Service trace of '{}': {} fields, {} tables",
                field_id,
                result.involved_fields.len(),
                result.involved_tables.len()
            );
            result
        }
        Err(e) => {
            warn!("Trace service failed for '{}': {}, tracing locally", field_id, e);
            graph
                .map(|g| trace_locally(g, field_id))
                .unwrap_or_default()
        }
    }
}
