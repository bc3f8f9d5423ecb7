//! The `canvas-history` command line.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use history_core::{HistoryGraph, NodeId};

use crate::config::SessionConfig;
use crate::persist::{BundleStore, HistoryBundle};
use crate::session::DesignSession;

/// Command-line arguments for canvas-history.
#[derive(Debug, Clone, Parser)]
#[command(name = "canvas-history")]
#[command(about = "Inspect and validate saved canvas history bundles")]
#[command(version)]
pub struct CliArgs {
    /// Directory of saved bundles
    #[arg(long, global = true, env = "CANVAS_HISTORY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Summarize a bundle: node count, depth, leaves, sources
    Inspect {
        /// Bundle file
        file: PathBuf,
    },
    /// Fully validate a bundle; exits non-zero if invalid
    Validate {
        /// Bundle file
        file: PathBuf,
    },
    /// Print the history as an indented tree
    Tree {
        /// Bundle file
        file: PathBuf,
    },
    /// Print the path from the root to a node
    Path {
        /// Bundle file
        file: PathBuf,
        /// Node id
        #[arg(value_parser = parse_node_id)]
        node: NodeId,
    },
    /// List saved sessions in the data directory
    List,
}

fn parse_node_id(s: &str) -> Result<NodeId, uuid::Error> {
    NodeId::parse(s)
}

/// Shape statistics for a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySummary {
    /// Root node.
    pub root_id: Option<NodeId>,
    /// Number of nodes.
    pub node_count: usize,
    /// Number of distinct snapshots referenced.
    pub snapshot_count: usize,
    /// Deepest node depth.
    pub max_depth: usize,
    /// Number of leaves (open branches).
    pub leaf_count: usize,
    /// Node count per source tag.
    pub sources: BTreeMap<&'static str, usize>,
}

impl HistorySummary {
    /// Compute statistics for `graph`.
    #[must_use]
    pub fn of(graph: &HistoryGraph) -> Self {
        let mut sources = BTreeMap::new();
        let mut max_depth = 0;
        for (id, node) in graph.get_all_nodes() {
            *sources.entry(node.source().as_str()).or_insert(0) += 1;
            if let Ok(depth) = graph.depth(*id) {
                max_depth = max_depth.max(depth);
            }
        }
        Self {
            root_id: graph.root_id(),
            node_count: graph.len(),
            snapshot_count: graph.snapshot_ids().len(),
            max_depth,
            leaf_count: graph.leaves().len(),
            sources,
        }
    }
}

impl std::fmt::Display for HistorySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.root_id {
            Some(root) => writeln!(f, "root:      {root}")?,
            None => writeln!(f, "root:      (none)")?,
        }
        writeln!(f, "nodes:     {}", self.node_count)?;
        writeln!(f, "snapshots: {}", self.snapshot_count)?;
        writeln!(f, "max depth: {}", self.max_depth)?;
        writeln!(f, "leaves:    {}", self.leaf_count)?;
        for (source, count) in &self.sources {
            writeln!(f, "  {source:<14} {count}")?;
        }
        Ok(())
    }
}

/// Load a bundle file into a fresh session, validating everything.
///
/// # Errors
///
/// Returns an error if the file can't be read, parsed or imported.
pub fn load_session(file: &Path, config: &SessionConfig) -> anyhow::Result<DesignSession> {
    let bundle = HistoryBundle::read_from(file)
        .with_context(|| format!("Failed to read bundle {}", file.display()))?;
    let session = DesignSession::new(config.clone());
    session
        .import_bundle(bundle)
        .with_context(|| format!("Invalid bundle {}", file.display()))?;
    Ok(session)
}

/// Render the graph as an indented tree, children in creation order.
#[must_use]
pub fn render_tree(graph: &HistoryGraph) -> String {
    let mut out = String::new();
    let Some(root) = graph.root_id() else {
        return out;
    };
    let mut stack = vec![(root, 0_usize)];
    while let Some((id, depth)) = stack.pop() {
        let Ok(node) = graph.get_node(id) else {
            continue;
        };
        let prompt = if node.prompt().is_empty() {
            String::new()
        } else {
            format!(" \"{}\"", node.prompt())
        };
        out.push_str(&format!(
            "{:indent$}{id} [{}]{prompt}\n",
            "",
            node.source(),
            indent = depth * 2
        ));
        for child in node.child_ids().iter().rev() {
            stack.push((*child, depth + 1));
        }
    }
    out
}

/// Execute a command, writing human-readable output to `out`.
///
/// # Errors
///
/// Returns an error if the command fails; `validate` fails on an invalid
/// bundle.
pub fn run(args: &CliArgs, config: &SessionConfig, out: &mut impl Write) -> anyhow::Result<()> {
    match &args.command {
        Command::Inspect { file } => {
            let session = load_session(file, config)?;
            let summary = session.with_graph(HistorySummary::of);
            write!(out, "{summary}")?;
        }
        Command::Validate { file } => {
            let bundle = HistoryBundle::read_from(file)
                .with_context(|| format!("Failed to read bundle {}", file.display()))?;
            let cyclic = bundle.graph.detect_cycles();
            let session = DesignSession::new(config.clone());
            if let Err(e) = session.import_bundle(bundle) {
                if cyclic {
                    anyhow::bail!("{}: {e} (cycle or orphaned node)", file.display());
                }
                anyhow::bail!("{}: {e}", file.display());
            }
            writeln!(out, "{}: ok ({} nodes)", file.display(), session.node_count())?;
        }
        Command::Tree { file } => {
            let session = load_session(file, config)?;
            write!(out, "{}", session.with_graph(render_tree))?;
        }
        Command::Path { file, node } => {
            let session = load_session(file, config)?;
            let path = session.path_to_root(*node)?;
            for (depth, id) in path.iter().enumerate() {
                let node = session.node(*id)?;
                writeln!(out, "{depth:>3} {id} [{}]", node.source())?;
            }
        }
        Command::List => {
            let dir = args
                .data_dir
                .as_ref()
                .or(config.data_dir.as_ref())
                .context("No data directory configured (set --data-dir or CANVAS_HISTORY_DATA_DIR)")?;
            let store = BundleStore::with_data_dir(dir)?;
            for name in store.list()? {
                writeln!(out, "{name}")?;
            }
        }
    }
    Ok(())
}
