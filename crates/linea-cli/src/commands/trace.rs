//! Trace command - Trace a field through its lineage
//!
//! With `--table`, the table's neighbourhood is fetched first so the trace can
//! fall back to the loaded edges when the service cannot answer.

use anyhow::{Context, Result};
use clap::Args;
use linea_client::resolve_trace;
use linea_core::LineageDirection;
use serde::Serialize;
use std::collections::BTreeSet;

use super::{create_explorer, load_config, print_json};
use crate::GlobalOptions;

/// Arguments for the trace command
#[derive(Args, Debug)]
pub struct TraceArgs {
    /// Field id to trace
    field: String,

    /// Table whose lineage to load for the local fallback
    #[arg(long)]
    table: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct TraceOutput<'a> {
    field: &'a str,
    involved_tables: &'a BTreeSet<String>,
    involved_fields: &'a BTreeSet<String>,
}

/// Execute the trace command
pub async fn execute(args: TraceArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let explorer = create_explorer(&config)?;

    let result = match args.table {
        Some(ref table) => {
            explorer
                .select_table(table.as_str(), LineageDirection::Both, config.api.depth)
                .await
                .with_context(|| format!("Failed to fetch lineage for '{}'", table))?;
            explorer.trace_field(&args.field).await
        }
        None => resolve_trace(explorer.api(), None, &args.field).await,
    };

    if args.json {
        return print_json(
            &TraceOutput {
                field: &args.field,
                involved_tables: &result.involved_tables,
                involved_fields: &result.involved_fields,
            },
            false,
        );
    }

    if result.is_empty() {
        println!("No lineage found for '{}'", args.field);
        return Ok(());
    }

    println!("Trace of {}", args.field);
    println!("\nTables ({}):", result.involved_tables.len());
    for table in &result.involved_tables {
        println!("  {}", table);
    }
    println!("\nFields ({}):", result.involved_fields.len());
    for field in &result.involved_fields {
        println!("  {}", field);
    }
    Ok(())
}
