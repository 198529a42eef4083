// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Contextweave CLI
//!
//! Renders JSON tree documents under a token budget.

mod document;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contextweave_core::{
    rectify_weights, render, NodeId, RectifiedWeights, RenderConfig, RenderNode, RenderOptions,
    SnapshotCache, Snapshotter,
};
use document::NodeDocument;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "contextweave")]
#[command(about = "Contextweave - budgeted tree renderer", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one or more tree documents
    ///
    /// Documents rendered together share one snapshot cache, so subtrees
    /// with the same id are costed once.
    Render {
        /// Tree documents (JSON)
        #[arg(required = true)]
        trees: Vec<PathBuf>,

        /// Token budget; overrides the configuration
        #[arg(short, long)]
        budget: Option<f64>,

        /// Node id to exclude, with its subtree (repeatable)
        #[arg(short, long)]
        mask: Vec<u64>,

        /// Rank by raw weights
        #[arg(long)]
        no_rectify: bool,

        /// Trust per-node estimates instead of measuring the output
        #[arg(long)]
        estimate_only: bool,
    },

    /// Show per-node cost, weight and value
    Inspect {
        /// Tree document (JSON)
        tree: PathBuf,
    },
}

#[derive(Serialize)]
struct NodeReport {
    id: NodeId,
    cost: f64,
    weight: f64,
    rectified_weight: Option<f64>,
    value: f64,
}

fn load_config(path: Option<&Path>) -> Result<RenderConfig> {
    match path {
        Some(path) => RenderConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => Ok(RenderConfig::default()),
    }
}

fn snapshot_tree(
    path: &Path,
    config: &RenderConfig,
    cache: &SnapshotCache,
) -> Result<Arc<RenderNode>> {
    let tree = NodeDocument::load(path)?.into_virtual()?;
    let tokens = config.token_calculator();

    let root = Snapshotter::new(&tokens)
        .default_elision_marker(config.default_elision_marker.clone())
        .cache(cache)
        .snapshot(&tree)
        .context("Failed to snapshot tree")?;

    info!(
        nodes = root.subtree_len(),
        estimated_cost = root.subtree_cost(),
        "Loaded tree from {:?}",
        path
    );
    Ok(root)
}

fn run_render(
    cli: &Cli,
    config: &RenderConfig,
    cache: &SnapshotCache,
    tree: &Path,
    mask: &[u64],
) -> Result<()> {
    let root = snapshot_tree(tree, config, cache)?;
    let tokens = config.token_calculator();
    let weights = if config.rectify {
        Some(rectify_weights(&root, None).context("Failed to rectify weights")?)
    } else {
        None
    };

    let mut options = RenderOptions::new().mask(mask.iter().copied());
    if let Some(budget) = config.budget {
        options = options.with_budget(budget);
    }
    if let Some(weights) = &weights {
        options = options.with_weights(weights);
    }
    if config.use_true_cost {
        options = options.with_true_cost(&tokens);
    }

    let output = render(&root, &options).context("Render failed")?;
    info!(
        cost = output.cost,
        budget = ?config.budget,
        rendered = output.rendered_nodes.len(),
        "Rendered tree"
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output.summary())?);
    } else {
        println!("{}", output.text);
    }
    Ok(())
}

fn run_inspect(
    cli: &Cli,
    config: &RenderConfig,
    cache: &SnapshotCache,
    tree: &Path,
) -> Result<()> {
    let root = snapshot_tree(tree, config, cache)?;
    let weights: RectifiedWeights =
        rectify_weights(&root, None).context("Failed to rectify weights")?;

    let reports: Vec<NodeReport> = root
        .iter()
        .map(|node| NodeReport {
            id: node.id(),
            cost: node.cost(),
            weight: node.weight(),
            rectified_weight: weights.rectified_weight(node.id()),
            value: weights.value(node),
        })
        .collect();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    println!(
        "{:>10}  {:>8}  {:>8}  {:>10}  {:>8}",
        "id", "cost", "weight", "rectified", "value"
    );
    for report in &reports {
        let rectified = report
            .rectified_weight
            .map_or_else(|| "-".to_string(), |w| format!("{:.3}", w));
        println!(
            "{:>10}  {:>8.1}  {:>8.3}  {:>10}  {:>8.4}",
            report.id, report.cost, report.weight, rectified, report.value
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(cli.config.as_deref())?;
    let cache = SnapshotCache::new(config.snapshot_cache_capacity);

    match &cli.command {
        Commands::Render {
            trees,
            budget,
            mask,
            no_rectify,
            estimate_only,
        } => {
            if let Some(budget) = budget {
                config = config.with_budget(*budget);
            }
            if *no_rectify {
                config.rectify = false;
            }
            if *estimate_only {
                config.use_true_cost = false;
            }
            config.validate().context("Invalid configuration")?;

            for tree in trees {
                run_render(&cli, &config, &cache, tree, mask)?;
            }
            Ok(())
        }
        Commands::Inspect { tree } => run_inspect(&cli, &config, &cache, tree),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_document(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", json).unwrap();
        file
    }

    #[test]
    fn test_documents_share_snapshot_cache() {
        let first = write_document(
            r#"{ "id": 1, "text": ["", "\nv1"], "children": [{ "id": 5, "text": ["shared"] }] }"#,
        );
        let second = write_document(
            r#"{ "id": 2, "text": ["", "\nv2"], "children": [{ "id": 5, "text": ["shared"] }] }"#,
        );
        let config = RenderConfig::default();
        let cache = SnapshotCache::new(config.snapshot_cache_capacity);

        let a = snapshot_tree(first.path(), &config, &cache).unwrap();
        let b = snapshot_tree(second.path(), &config, &cache).unwrap();

        assert!(Arc::ptr_eq(&a.children()[0], &b.children()[0]));
        assert!(cache.get(NodeId(2)).is_some());
    }

    #[test]
    fn test_render_accepts_several_documents() {
        let cli = Cli::try_parse_from([
            "contextweave",
            "render",
            "a.json",
            "b.json",
            "--budget",
            "64",
            "--mask",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Render {
                trees, budget, mask, ..
            } => {
                assert_eq!(trees, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
                assert_eq!(budget, Some(64.0));
                assert_eq!(mask, vec![3]);
            }
            Commands::Inspect { .. } => panic!("expected render"),
        }

        assert!(Cli::try_parse_from(["contextweave", "render"]).is_err());
    }
}
