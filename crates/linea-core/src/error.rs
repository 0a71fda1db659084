//! Error types for the projection engine.
//!
//! Most of the engine is infallible by construction: invariant violations in
//! the input graph are dropped or demoted to independent tables instead of
//! failing a render pass. Errors only surface at the parsing boundary and for
//! lookups the caller asked for explicitly.

use thiserror::Error;

/// Errors raised by `linea-core`.
#[derive(Error, Debug)]
pub enum LineaError {
    /// Response body was not a valid lineage graph
    #[error("invalid lineage graph JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A node id referenced by the caller is not in the loaded graph
    #[error("node '{id}' not found in lineage graph")]
    NodeNotFound { id: String },

    /// A node exists but has the wrong type for the operation
    #[error("node '{id}' is a {actual}, expected a {expected}")]
    WrongNodeType {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A bucket key could not be parsed into a domain path
    #[error("invalid bucket key '{0}'")]
    InvalidBucketKey(String),
}

impl LineaError {
    /// Create a NodeNotFound error.
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create a WrongNodeType error.
    pub fn wrong_node_type(
        id: impl Into<String>,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Self::WrongNodeType {
            id: id.into(),
            expected,
            actual,
        }
    }
}
