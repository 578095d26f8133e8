//! Deps command implementation.

use super::inspect::load_document;
use contenthub_cdf::CdfDocument;
use contenthub_sync_engine::{
    DependencyGraph, DependencyKind, DocumentResolver, GraphOptions, HubConfig,
};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

/// Dependency closure of a record.
#[derive(Debug, Serialize)]
pub struct DepsResult {
    /// Root record.
    pub root: Uuid,
    /// Depth limit used.
    pub max_depth: u32,
    /// Records in the order an importer creates them.
    pub order: Vec<DepsEntry>,
    /// Referenced UUIDs not present in the document.
    pub missing: Vec<Uuid>,
}

/// One record of the closure.
#[derive(Debug, Serialize)]
pub struct DepsEntry {
    /// Record UUID.
    pub uuid: Uuid,
    /// Record type.
    pub record_type: String,
    /// `pre`, `root`, or `post`.
    pub role: &'static str,
    /// Edges from the root.
    pub depth: u32,
}

/// Loads a hub configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<HubConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("Could not read {}: {e}", path.display()))?;
            Ok(HubConfig::from_json(&json)?)
        }
        None => Ok(HubConfig::default()),
    }
}

/// Runs the deps command.
pub fn run(
    path: &Path,
    root: Uuid,
    depth: Option<u32>,
    config: Option<&Path>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let document = load_document(path)?;
    let mut options = load_config(config)?.graph_options();
    if let Some(depth) = depth {
        options = options.with_max_depth(depth);
    }
    let result = resolve(&document, root, &options)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Expands the dependencies of `root` within `document`.
pub fn resolve(
    document: &CdfDocument,
    root: Uuid,
    options: &GraphOptions,
) -> Result<DepsResult, Box<dyn std::error::Error>> {
    let record = document
        .get(root)
        .cloned()
        .ok_or_else(|| format!("Record {root} not found in document"))?;
    let graph = DependencyGraph::expand(record, &DocumentResolver::new(document), options);

    let order = graph
        .materialization_order()
        .into_iter()
        .filter_map(|uuid| {
            if uuid == root {
                return Some(DepsEntry {
                    uuid,
                    record_type: graph.root().record_type().to_string(),
                    role: "root",
                    depth: 0,
                });
            }
            graph.get(uuid).map(|node| DepsEntry {
                uuid,
                record_type: node.record.record_type().to_string(),
                role: match node.kind {
                    DependencyKind::Independent => "pre",
                    DependencyKind::Dependent => "post",
                },
                depth: node.depth,
            })
        })
        .collect();

    Ok(DepsResult {
        root,
        max_depth: options.max_depth,
        order,
        missing: graph.missing().to_vec(),
    })
}

fn print_text_output(result: &DepsResult) {
    println!("Dependencies of {} (depth {})", result.root, result.max_depth);
    println!();
    for (i, entry) in result.order.iter().enumerate() {
        println!(
            "{:>3}. [{:<4}] {} {} (depth {})",
            i + 1,
            entry.role,
            entry.uuid,
            entry.record_type,
            entry.depth
        );
    }
    if !result.missing.is_empty() {
        println!();
        println!("Missing:");
        for uuid in &result.missing {
            println!("  {uuid}");
        }
    }
}
