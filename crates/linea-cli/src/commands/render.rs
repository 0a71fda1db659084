//! Render command - Project and lay out a saved lineage response
//!
//! Works fully offline: traces are resolved against the file's own edges.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use linea_core::{
    render, trace_locally, LineaError, LineageGraph, LineageGraphResponse, NodeType,
    ProjectionState,
};
use tracing::{debug, warn};

use super::{load_config, print_json, ViewArgs};
use crate::GlobalOptions;

/// Arguments for the render command
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Lineage response JSON file (`-` for stdin)
    file: PathBuf,

    /// Table to centre the projection on (default: the response's root)
    #[arg(long)]
    focal: Option<String>,

    #[command(flatten)]
    view: ViewArgs,
}

/// Execute the render command
pub async fn execute(args: RenderArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;

    let json = read_input(&args.file)?;
    let response = LineageGraphResponse::from_json(&json)
        .with_context(|| format!("Invalid lineage response in {}", args.file.display()))?;
    let graph = LineageGraph::from_response(&response);
    debug!(
        "Read {} nodes, {} edges from {}",
        graph.node_count(),
        graph.edge_count(),
        args.file.display()
    );

    let focal = match args.focal {
        Some(ref focal) => {
            ensure_table(&graph, focal)?;
            focal.clone()
        }
        None => graph.root_id().to_string(),
    };
    if focal.is_empty() && !graph.is_empty() {
        bail!("Response has no root_id; pass --focal <TABLE>");
    }

    let state = build_state(&graph, &args.view)?;
    let rendered = render(&graph, &focal, &state, &config.render_options());
    print_json(&rendered, args.view.compact)
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Apply the requested interactions in order: expand, collapse, extract, trace.
fn build_state(graph: &LineageGraph, view: &ViewArgs) -> Result<ProjectionState> {
    let mut state = ProjectionState::new();
    for key in &view.expand {
        state.expand_bucket(key)?;
    }
    for key in &view.collapse {
        state.collapse_bucket(key)?;
    }
    for table in &view.extract {
        ensure_table(graph, table)?;
        state.extract_table(table.as_str());
    }
    if let Some(ref field) = view.trace {
        let result = trace_locally(graph, field);
        if result.is_empty() {
            warn!("Field '{}' has no lineage in this response", field);
        }
        state.apply_trace(&result);
    }
    Ok(state)
}

fn ensure_table(graph: &LineageGraph, id: &str) -> Result<(), LineaError> {
    let node = graph.get_node(id).ok_or_else(|| LineaError::node_not_found(id))?;
    if node.node_type != NodeType::Table {
        return Err(LineaError::wrong_node_type(
            id,
            NodeType::Table.as_str(),
            node.node_type.as_str(),
        ));
    }
    Ok(())
}
