//! CLI command implementations
//!
//! This module contains all Linea CLI command implementations.

pub mod config;
pub mod delete_edge;
pub mod render;
pub mod show;
pub mod tables;
pub mod trace;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use linea_client::{HttpLineageApi, LineageExplorer};
use linea_config::{ConfigLoader, LineaConfig};
use serde::Serialize;
use tracing::Level;

use crate::GlobalOptions;

/// Projection interactions shared by the rendering commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// Expand a domain bucket by key (e.g. `Sales-Orders`); repeatable
    #[arg(long, value_name = "KEY")]
    pub expand: Vec<String>,

    /// Collapse a domain bucket by key, including nested expansions; repeatable
    #[arg(long, value_name = "KEY")]
    pub collapse: Vec<String>,

    /// Pull a table out of its bucket; repeatable
    #[arg(long, value_name = "TABLE")]
    pub extract: Vec<String>,

    /// Highlight the lineage of a field
    #[arg(long, value_name = "FIELD")]
    pub trace: Option<String>,

    /// Print compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}

/// Resolve the directory holding the local config.
pub fn resolve_root(global: &GlobalOptions) -> Result<PathBuf> {
    match global.root {
        Some(ref root) => Ok(root.clone()),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

/// Config loader honouring `--config-home`.
pub fn config_loader(global: &GlobalOptions) -> ConfigLoader {
    match global.config_home {
        Some(ref dir) => ConfigLoader::with_global_dir(dir),
        None => ConfigLoader::new(),
    }
}

/// Load configuration: global, then local, then environment and CLI overrides.
pub fn load_config(global: &GlobalOptions) -> Result<LineaConfig> {
    let root = resolve_root(global)?;
    let overrides = global.to_config_overrides();
    config_loader(global)
        .load(&root, Some(&overrides))
        .context("Failed to load configuration")
}

/// Log level from `-q`/`-v`, else the configured level.
///
/// Configuration errors are ignored here; the command reports them.
pub fn log_level(global: &GlobalOptions) -> Level {
    if global.quiet {
        return Level::ERROR;
    }
    if global.verbose {
        return Level::DEBUG;
    }
    load_config(global)
        .ok()
        .and_then(|config| config.logging.level.parse().ok())
        .unwrap_or(Level::INFO)
}

/// Explorer session against the configured lineage service.
pub fn create_explorer(config: &LineaConfig) -> Result<LineageExplorer<HttpLineageApi>> {
    let api = HttpLineageApi::new(&config.api).context("Failed to create lineage client")?;
    Ok(LineageExplorer::new(api, config.render_options()))
}

/// Print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", json);
    Ok(())
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
