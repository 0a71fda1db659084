//! Tables command - List tables known to the lineage service

use anyhow::{bail, Context, Result};
use clap::Args;
use linea_client::{HttpLineageApi, LineageApi};

use super::{load_config, print_json, print_info};
use crate::GlobalOptions;

/// Arguments for the tables command
#[derive(Args, Debug)]
pub struct TablesArgs {
    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    page: u64,

    /// Page size (default: api.page_size)
    #[arg(long)]
    size: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the tables command
pub async fn execute(args: TablesArgs, global: GlobalOptions) -> Result<()> {
    if args.page == 0 {
        bail!("--page starts at 1");
    }
    let config = load_config(&global)?;
    let api = HttpLineageApi::new(&config.api).context("Failed to create lineage client")?;
    let size = args.size.unwrap_or(config.api.page_size as u64);

    let page = api
        .list_tables(args.page, size)
        .await
        .context("Failed to list tables")?;

    if args.json {
        return print_json(&page, false);
    }

    if page.items.is_empty() {
        print_info("No tables found.", global.quiet);
        return Ok(());
    }

    let width = page.items.iter().map(|t| t.id.len()).max().unwrap_or(0);
    for table in &page.items {
        let fields = table
            .field_count
            .map(|n| format!("  ({} fields)", n))
            .unwrap_or_default();
        println!("{:<width$}  {}{}", table.id, table.display_name(), fields, width = width);
    }
    print_info(
        &format!(
            "\nPage {} of {} tables ({} per page)",
            page.page, page.total, page.size
        ),
        global.quiet,
    );
    Ok(())
}
