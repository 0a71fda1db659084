//! User-steerable projection state.
//!
//! The render/interaction layer owns one [`ProjectionState`] per session and
//! mutates it in response to gestures; the engine only reads it. Every mutation
//! is followed by a full, synchronous re-projection over the cached raw graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::domain::DomainPath;
use crate::error::LineaError;
use crate::trace::TraceResult;

/// Inputs that make aggregation user-steerable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionState {
    /// Bucket keys the user explicitly expanded
    pub manual_expanded_paths: BTreeSet<String>,

    /// Tables pulled out of their bucket to be shown on their own
    pub extracted_table_ids: BTreeSet<String>,

    /// Node ids highlighted by the active field trace
    pub involved_ids: BTreeSet<String>,
}

impl ProjectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand the bucket with the given key.
    pub fn expand_bucket(&mut self, key: &str) -> Result<(), LineaError> {
        let path = parse_key(key)?;
        debug!("Expanding bucket '{}'", path);
        self.manual_expanded_paths.insert(path.key());
        Ok(())
    }

    /// Collapse the bucket with the given key, along with any expanded descendants.
    ///
    /// Only manual expansions are undone. A prefix that auto-expands (every
    /// table already visible, or a single child and no direct tables) is
    /// expanded again on the next projection, so collapsing it has no
    /// visible effect.
    pub fn collapse_bucket(&mut self, key: &str) -> Result<(), LineaError> {
        let path = parse_key(key)?;
        debug!("Collapsing bucket '{}'", path);
        self.manual_expanded_paths.retain(|existing| {
            DomainPath::from_key(existing).is_none_or(|p| !path.is_prefix_of(&p))
        });
        Ok(())
    }

    /// Pull a table out of its bucket.
    pub fn extract_table(&mut self, table_id: impl Into<String>) {
        self.extracted_table_ids.insert(table_id.into());
    }

    /// Replace the highlight set with a trace result.
    pub fn apply_trace(&mut self, trace: &TraceResult) {
        self.involved_ids = trace.involved_ids();
    }

    pub fn clear_trace(&mut self) {
        self.involved_ids.clear();
    }

    /// True while a field trace is highlighted.
    pub fn is_tracing(&self) -> bool {
        !self.involved_ids.is_empty()
    }

    /// True if the user expanded any bucket by hand.
    pub fn has_manual_expansion(&self) -> bool {
        !self.manual_expanded_paths.is_empty()
    }

    /// Forget everything; used when the focal table changes.
    pub fn reset(&mut self) {
        self.manual_expanded_paths.clear();
        self.extracted_table_ids.clear();
        self.involved_ids.clear();
    }
}

fn parse_key(key: &str) -> Result<DomainPath, LineaError> {
    DomainPath::from_key(key).ok_or_else(|| LineaError::InvalidBucketKey(key.to_string()))
}
