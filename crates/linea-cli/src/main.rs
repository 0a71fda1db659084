//! Linea CLI - Data lineage exploration and rendering
//!
//! A command-line front end for the lineage projection engine. It fetches
//! lineage neighbourhoods from the lineage service (or reads them from a
//! file), aggregates them into domain buckets and prints the positioned
//! graph as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Render a saved lineage response
//! linea render lineage.json --expand Sales
//!
//! # Fetch and render the upstream lineage of a table
//! linea show orders --depth 3
//!
//! # Trace a field through the service
//! linea trace orders.amount
//!
//! # Delete a lineage relationship after confirmation
//! linea delete-edge orders r5
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use linea_core::FlowDirection;
use tracing_subscriber::FmtSubscriber;

mod commands;

/// Linea - Data lineage graph explorer
#[derive(Parser, Debug)]
#[command(name = "linea")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Directory holding the local `.linea/config.toml` (default: current directory)
    #[arg(long, global = true, env = "LINEA_ROOT")]
    root: Option<PathBuf>,

    /// Directory holding the global config (default: ~/.linea)
    #[arg(long, global = true, env = "LINEA_CONFIG_HOME")]
    config_home: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Lineage service base URL
    #[arg(long, global = true, env = "LINEA_API_URL")]
    api_url: Option<String>,

    /// Bearer token for the lineage service
    #[arg(long, global = true, env = "LINEA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Minimum table count before domain aggregation kicks in
    #[arg(long, global = true, env = "LINEA_AGGREGATION_THRESHOLD")]
    threshold: Option<usize>,

    /// Layout flow direction (LR, RL)
    #[arg(long, global = true, value_parser = parse_flow)]
    flow: Option<FlowDirection>,
}

/// Parse a flow direction from string
fn parse_flow(s: &str) -> Result<FlowDirection, String> {
    match s.to_ascii_uppercase().as_str() {
        "LR" => Ok(FlowDirection::LeftToRight),
        "RL" => Ok(FlowDirection::RightToLeft),
        _ => Err(format!("unknown flow '{}', expected: LR, RL", s)),
    }
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> linea_config::ConfigOverrides {
        linea_config::ConfigOverrides {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            threshold: self.threshold,
            flow: self.flow,
            log_level: None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a lineage response read from a JSON file
    Render(commands::render::RenderArgs),

    /// Fetch a table's lineage from the service and render it
    Show(commands::show::ShowArgs),

    /// Trace a field through its upstream and downstream lineage
    Trace(commands::trace::TraceArgs),

    /// List tables known to the lineage service
    Tables(commands::tables::TablesArgs),

    /// Delete a lineage relationship
    DeleteEdge(commands::delete_edge::DeleteEdgeArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity, falling back to the configured level
    let log_level = commands::log_level(&cli.global);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Render(args) => commands::render::execute(args, cli.global).await,
        Commands::Show(args) => commands::show::execute(args, cli.global).await,
        Commands::Trace(args) => commands::trace::execute(args, cli.global).await,
        Commands::Tables(args) => commands::tables::execute(args, cli.global).await,
        Commands::DeleteEdge(args) => commands::delete_edge::execute(args, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global).await,
    }
}
