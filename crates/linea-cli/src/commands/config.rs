//! Config command - View and manage configuration
//!
//! - Show the effective configuration and where each value came from
//! - Create default config files
//! - Show configuration file paths

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use linea_config::LineaConfig;
use serde::Serialize;

use super::{config_loader, load_config, resolve_root};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration with value sources
    Show(ShowArgs),

    /// Create a config file with default values
    Init(InitArgs),

    /// Show configuration file paths
    Path(PathArgs),
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Print the effective configuration as TOML, without sources
    #[arg(long, conflicts_with = "json")]
    effective: bool,
}

/// Arguments for the init command
#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Create the global config instead of the local one
    #[arg(long)]
    global: bool,
}

/// Arguments for the path command
#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Configuration value with source information
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue {
    /// Dotted key, e.g. `projection.threshold`
    pub key: String,
    /// Effective value
    pub value: serde_json::Value,
    /// Source of this value (default, global, local, override)
    pub source: &'static str,
}

/// Configuration paths
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    /// Global config file path
    pub global: Option<PathBuf>,
    /// Local config file path
    pub local: PathBuf,
    /// Whether global config exists
    pub global_exists: bool,
    /// Whether local config exists
    pub local_exists: bool,
}

/// Execute the config command
pub async fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, global),
        ConfigCommand::Init(args) => execute_init(args, global),
        ConfigCommand::Path(args) => execute_path(args, global),
    }
}

fn execute_show(args: ShowArgs, global: GlobalOptions) -> Result<()> {
    let root = resolve_root(&global)?;
    let mut loader = config_loader(&global);

    let global_config = loader.load_global()?.unwrap_or_default();
    let local_config = loader.load_local(&root)?.unwrap_or_default();
    let effective = load_config(&global)?;

    if args.effective {
        print!(
            "{}",
            toml::to_string_pretty(&effective).context("Failed to serialize configuration")?
        );
        return Ok(());
    }

    let values = collect_config_values(&global_config, &local_config, &effective)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    let width = values.iter().map(|v| v.key.len()).max().unwrap_or(0);
    for value in &values {
        println!(
            "{:<width$}  {:<28}  ({})",
            value.key,
            value.value.to_string(),
            value.source,
            width = width
        );
    }
    Ok(())
}

fn execute_init(args: InitArgs, global: GlobalOptions) -> Result<()> {
    let loader = config_loader(&global);

    let path = if args.global {
        loader
            .global_config_path()
            .context("No home directory; pass --config-home")?
    } else {
        loader.local_config_path(&resolve_root(&global)?)
    };
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }

    let created = if args.global {
        loader.init_global()?
    } else {
        loader.init_local(&resolve_root(&global)?)?
    };
    println!("Created {}", created.display());
    Ok(())
}

fn execute_path(args: PathArgs, global: GlobalOptions) -> Result<()> {
    let root = resolve_root(&global)?;
    let loader = config_loader(&global);
    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&root);

    let paths = ConfigPaths {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        local_exists: local_path.exists(),
        global: global_path,
        local: local_path,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    println!("Configuration Paths");
    println!("===================\n");

    match paths.global {
        Some(ref gp) => println!(
            "Global: {} ({})",
            gp.display(),
            exists_label(paths.global_exists)
        ),
        None => println!("Global: not available (no home directory)"),
    }
    println!(
        "Local:  {} ({})",
        paths.local.display(),
        exists_label(paths.local_exists)
    );
    Ok(())
}

fn exists_label(exists: bool) -> &'static str {
    if exists {
        "exists"
    } else {
        "not found"
    }
}

/// Attribute every effective value to the last layer that set it.
///
/// A file layer counts as setting a key when its value differs from the
/// default, the same rule the loader merges by.
fn collect_config_values(
    global: &LineaConfig,
    local: &LineaConfig,
    effective: &LineaConfig,
) -> Result<Vec<ConfigValue>> {
    let defaults = flatten_config(&LineaConfig::default())?;
    let global = flatten_config(global)?;
    let local = flatten_config(local)?;
    let effective = flatten_config(effective)?;

    let values = effective
        .into_iter()
        .map(|(key, value)| {
            let default = defaults.get(&key);
            let set_in = |layer: &BTreeMap<String, serde_json::Value>| {
                let v = layer.get(&key);
                v.is_some() && v != default && v == Some(&value)
            };
            let source = if set_in(&local) {
                "local"
            } else if set_in(&global) {
                "global"
            } else if Some(&value) == default {
                "default"
            } else {
                "override"
            };
            ConfigValue { key, value, source }
        })
        .collect();
    Ok(values)
}

fn flatten_config(config: &LineaConfig) -> Result<BTreeMap<String, serde_json::Value>> {
    let mut out = BTreeMap::new();
    flatten_value("", serde_json::to_value(config)?, &mut out);
    Ok(out)
}

fn flatten_value(
    prefix: &str,
    value: serde_json::Value,
    out: &mut BTreeMap<String, serde_json::Value>,
) {
    match value {
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten_value(&key, v, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other);
        }
    }
}
