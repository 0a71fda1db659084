//! Show command - Fetch a table's lineage and render it

use anyhow::{bail, Context, Result};
use clap::Args;
use linea_client::{HttpLineageApi, LineageExplorer, LoadOutcome};
use linea_core::LineageDirection;
use tracing::warn;

use super::{create_explorer, load_config, print_json, ViewArgs};
use crate::GlobalOptions;

/// Arguments for the show command
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Table id to centre on
    table: String,

    /// Traversal direction (upstream, downstream, both)
    #[arg(long, short = 'd')]
    direction: Option<LineageDirection>,

    /// Traversal depth in hops
    #[arg(long)]
    depth: Option<u32>,

    #[command(flatten)]
    view: ViewArgs,
}

/// Execute the show command
pub async fn execute(args: ShowArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let explorer = create_explorer(&config)?;

    let direction = args.direction.unwrap_or(config.api.direction);
    let depth = args.depth.unwrap_or(config.api.depth);
    if depth == 0 {
        bail!("--depth must be at least 1");
    }

    let outcome = explorer
        .select_table(args.table.as_str(), direction, depth)
        .await
        .with_context(|| format!("Failed to fetch lineage for '{}'", args.table))?;
    if outcome != LoadOutcome::Installed {
        bail!("Lineage for '{}' was not loaded", args.table);
    }

    apply_view(&explorer, &args.view).await?;
    print_json(&explorer.render(), args.view.compact)
}

/// Apply the requested interactions in order: expand, collapse, extract, trace.
async fn apply_view(explorer: &LineageExplorer<HttpLineageApi>, view: &ViewArgs) -> Result<()> {
    for key in &view.expand {
        explorer.expand_bucket(key)?;
    }
    for key in &view.collapse {
        explorer.collapse_bucket(key)?;
    }
    for table in &view.extract {
        explorer.extract_table(table)?;
    }
    if let Some(ref field) = view.trace {
        let result = explorer.trace_field(field).await;
        if result.is_empty() {
            warn!("Field '{}' has no lineage", field);
        }
    }
    Ok(())
}
