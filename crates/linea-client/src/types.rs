//! Request and response types for the lineage service.

use linea_core::LineageDirection;
use serde::{Deserialize, Deserializer, Serialize};

/// Parameters of a lineage neighbourhood fetch.
///
/// Two fetches race only when their requests compare equal; a response is
/// installed only while its request is still the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphRequest {
    pub table_id: String,
    pub direction: LineageDirection,
    pub depth: u32,
}

impl GraphRequest {
    pub fn new(table_id: impl Into<String>, direction: LineageDirection, depth: u32) -> Self {
        Self {
            table_id: table_id.into(),
            direction,
            depth,
        }
    }

    pub fn with_direction(&self, direction: LineageDirection) -> Self {
        Self {
            direction,
            ..self.clone()
        }
    }

    pub fn with_depth(&self, depth: u32) -> Self {
        Self {
            depth,
            ..self.clone()
        }
    }
}

/// A table as listed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_count: Option<u64>,
}

impl TableSummary {
    /// Qualified name when known, otherwise `schema.name` or the bare name.
    pub fn display_name(&self) -> String {
        if let Some(ref qualified) = self.qualified_name {
            return qualified.clone();
        }
        match self.schema_name {
            Some(ref schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

/// One page of the table listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePage {
    #[serde(default)]
    pub total: u64,

    #[serde(default)]
    pub page: u64,

    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub items: Vec<TableSummary>,
}

/// Ids arrive as UUID strings or, from older services, as integers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}
