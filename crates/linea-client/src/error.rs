//! Client error types.

use thiserror::Error;

/// Errors that can occur while talking to the lineage service or driving
/// an explorer session.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Service answered with a non-success status
    #[error("lineage service error: {status} - {message}")]
    Server { status: u16, message: String },

    /// Requested resource does not exist (HTTP 404)
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Credentials missing or rejected (HTTP 401/403)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    /// Response body did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A graph fetch is outstanding; conflicting actions are disabled
    #[error("a lineage request is in progress")]
    Busy,

    /// No table has been selected yet
    #[error("no lineage graph loaded")]
    NothingLoaded,

    /// Edge id is not part of the loaded graph
    #[error("edge '{0}' is not in the loaded graph")]
    UnknownEdge(String),

    /// Projection state rejected the input
    #[error(transparent)]
    Projection(#[from] linea_core::LineaError),

    #[error("configuration error: {0}")]
    Config(#[from] linea_config::ConfigError),
}

impl ClientError {
    /// Create a Server error.
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Create a NotFound error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a Connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Transient failures worth another attempt: connection problems,
    /// timeouts and 5xx answers. Never 4xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
