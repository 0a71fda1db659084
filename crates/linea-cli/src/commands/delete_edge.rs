//! Delete-edge command - Remove a lineage relationship
//!
//! The edge must belong to the table's loaded neighbourhood. After deletion
//! the neighbourhood is fetched again and summarised.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Args;
use linea_core::LineageDirection;

use super::{create_explorer, load_config, print_info};
use crate::GlobalOptions;

/// Arguments for the delete-edge command
#[derive(Args, Debug)]
pub struct DeleteEdgeArgs {
    /// Table whose lineage contains the edge
    table: String,

    /// Raw lineage edge id
    edge_id: String,

    /// Traversal direction used to find the edge (upstream, downstream, both)
    #[arg(long, short = 'd', default_value_t = LineageDirection::Both)]
    direction: LineageDirection,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,
}

/// Execute the delete-edge command
pub async fn execute(args: DeleteEdgeArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let explorer = create_explorer(&config)?;

    explorer
        .select_table(args.table.as_str(), args.direction, config.api.depth)
        .await
        .with_context(|| format!("Failed to fetch lineage for '{}'", args.table))?;

    let pending = explorer.delete_edge(&args.edge_id)?;

    if !args.yes {
        println!(
            "Delete lineage '{}' ({} -> {})?",
            pending.edge_id(),
            pending.source(),
            pending.target()
        );
        print!("Proceed? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            pending.cancel();
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    let edge_id = pending.edge_id().to_string();
    pending
        .confirm()
        .await
        .with_context(|| format!("Failed to delete lineage '{}'", edge_id))?;

    let stats = explorer.render().stats;
    println!("Deleted lineage '{}'", edge_id);
    print_info(
        &format!(
            "'{}' now has {} tables and {} edges in view",
            args.table, stats.raw_tables, stats.raw_edges
        ),
        global.quiet,
    );
    Ok(())
}
