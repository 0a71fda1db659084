//! Linea Client - Lineage service access and explorer session
//!
//! This crate connects the pure projection engine in `linea-core` to a
//! lineage service:
//!
//! - [`LineageApi`]: async interface over the consumed endpoints
//! - [`HttpLineageApi`]: reqwest implementation with bearer auth and retries
//! - [`resolve_trace`]: service trace with a local fallback
//! - [`LineageExplorer`]: the interactive session (fetch staleness, loading
//!   gate, bucket toggles, trace, edge deletion, render)
//!
//! ## Example
//!
//! ```ignore
//! use linea_client::{HttpLineageApi, LineageExplorer};
//! use linea_config::LineaConfig;
//!
//! let config = LineaConfig::default();
//! let api = HttpLineageApi::new(&config.api)?;
//! let explorer = LineageExplorer::new(api, config.render_options());
//!
//! explorer.select_table("orders", config.api.direction, config.api.depth).await?;
//! explorer.expand_bucket("Sales")?;
//! let rendered = explorer.render();
//! ```

mod error;
mod explorer;
mod http;
mod trace;
mod traits;
mod types;

pub use error::ClientError;
pub use explorer::{LineageExplorer, LoadOutcome, PendingDeletion};
pub use http::HttpLineageApi;
pub use trace::resolve_trace;
pub use traits::LineageApi;
pub use types::*;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
