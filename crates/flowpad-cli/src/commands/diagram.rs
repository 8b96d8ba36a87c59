//! Diagram commands

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::commands::layout::LayoutDocument;
use crate::output::{to_json, OutputFormat};
use crate::AppContext;
use flowpad_core::{ConnectorOrientation, DiagramId, Element, Graph, ItemId, Orientation, Removed};
use flowpad_session::Session;
use flowpad_storage::DiagramStore;

#[derive(Args)]
pub struct DiagramArgs {
    #[command(subcommand)]
    pub command: DiagramCommands,
}

#[derive(Subcommand)]
pub enum DiagramCommands {
    /// List saved diagrams
    List,
    /// Show the nodes and connections of a diagram
    Show {
        /// Diagram id
        id: u64,
    },
    /// Import a layout document as a diagram
    Import {
        /// Input file (JSON layout document)
        file: PathBuf,
        /// Replace the content of an existing diagram
        #[arg(long)]
        into: Option<u64>,
    },
    /// Export a diagram as a layout document
    Export {
        /// Diagram id
        id: u64,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove items from a diagram, along with their connections
    Remove {
        /// Diagram id
        id: u64,
        /// Item ids to remove
        #[arg(required = true)]
        items: Vec<u64>,
    },
}

#[derive(Serialize)]
struct DiagramView {
    id: DiagramId,
    nodes: Vec<NodeView>,
    connections: Vec<ConnectionView>,
}

#[derive(Serialize)]
struct NodeView {
    item_id: Option<ItemId>,
    kind: String,
}

#[derive(Serialize)]
struct ConnectionView {
    source: Option<ItemId>,
    source_side: Orientation,
    sink: Option<ItemId>,
    sink_side: Orientation,
}

impl DiagramView {
    fn new(id: DiagramId, graph: &Graph) -> Self {
        let item_of = |key| graph.node(key).and_then(|n| n.id());
        Self {
            id,
            nodes: graph
                .nodes()
                .map(|n| NodeView {
                    item_id: n.id(),
                    kind: n.kind().to_string(),
                })
                .collect(),
            connections: graph
                .connections()
                .map(|c| ConnectionView {
                    source: item_of(c.source().node),
                    source_side: c.source().orientation.into(),
                    sink: item_of(c.sink().node),
                    sink_side: c.sink().orientation.into(),
                })
                .collect(),
        }
    }
}

fn display_id(id: Option<ItemId>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Open a session with `id` loaded as the live graph
async fn load_session(ctx: &AppContext, id: u64) -> anyhow::Result<Session> {
    let mut session = ctx.session()?;
    session.select_diagram(Some(DiagramId(id)));
    session
        .load()
        .await
        .with_context(|| format!("Failed to load diagram {}", id))?;
    Ok(session)
}

pub async fn run(args: &DiagramArgs, ctx: &AppContext) -> anyhow::Result<()> {
    match &args.command {
        DiagramCommands::List => run_list(ctx),
        DiagramCommands::Show { id } => run_show(ctx, *id).await,
        DiagramCommands::Import { file, into } => run_import(ctx, file, *into).await,
        DiagramCommands::Export { id, output } => run_export(ctx, *id, output.as_deref()).await,
        DiagramCommands::Remove { id, items } => run_remove(ctx, *id, items).await,
    }
}

fn run_list(ctx: &AppContext) -> anyhow::Result<()> {
    let summaries = ctx.store.fetch_all_diagram_summaries()?;
    tracing::info!("Found {} diagrams", summaries.len());

    match ctx.format {
        OutputFormat::Json => println!("{}", to_json(&summaries)?),
        OutputFormat::Table => {
            if summaries.is_empty() {
                println!("No saved diagrams");
                return Ok(());
            }
            println!("{:<8} {:>6} {:>12}  SAVED", "ID", "ITEMS", "CONNECTIONS");
            for summary in &summaries {
                println!(
                    "{:<8} {:>6} {:>12}  {}",
                    summary.id,
                    summary.item_count,
                    summary.connection_count,
                    summary.saved_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }
    Ok(())
}

async fn run_show(ctx: &AppContext, id: u64) -> anyhow::Result<()> {
    let session = load_session(ctx, id).await?;
    let view = DiagramView::new(DiagramId(id), session.graph());

    match ctx.format {
        OutputFormat::Json => println!("{}", to_json(&view)?),
        OutputFormat::Table => {
            println!("Diagram {}", view.id);
            println!("  Items ({}):", view.nodes.len());
            for node in &view.nodes {
                println!("    {} ({})", display_id(node.item_id), node.kind);
            }
            println!("  Connections ({}):", view.connections.len());
            for c in &view.connections {
                println!(
                    "    {}:{} -> {}:{}",
                    display_id(c.source),
                    ConnectorOrientation::from(c.source_side),
                    display_id(c.sink),
                    ConnectorOrientation::from(c.sink_side)
                );
            }
        }
    }
    Ok(())
}

async fn run_import(ctx: &AppContext, file: &Path, into: Option<u64>) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let document = LayoutDocument::from_json(&content)?;

    let mut session = match into {
        Some(id) => {
            let mut session = load_session(ctx, id).await?;
            let elements = session.graph().elements();
            session.delete(&elements)?;
            session
        }
        None => ctx.session()?,
    };
    document.apply(session.graph_mut())?;

    let id = session.save().await?;
    tracing::info!("Imported {} as diagram {}", file.display(), id);

    match ctx.format {
        OutputFormat::Json => println!(
            "{}",
            to_json(&DiagramView::new(id, session.graph()))?
        ),
        OutputFormat::Table => println!(
            "Saved diagram {} ({} items, {} connections)",
            id,
            session.graph().node_count(),
            session.graph().connection_count()
        ),
    }
    Ok(())
}

async fn run_export(ctx: &AppContext, id: u64, output: Option<&Path>) -> anyhow::Result<()> {
    let session = load_session(ctx, id).await?;
    let document = LayoutDocument::from_graph(session.graph());
    let json = to_json(&document)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !ctx.quiet {
                eprintln!("Exported diagram {} to {}", id, path.display());
            }
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn run_remove(ctx: &AppContext, id: u64, items: &[u64]) -> anyhow::Result<()> {
    let mut session = load_session(ctx, id).await?;

    let mut elements = Vec::with_capacity(items.len());
    for item in items {
        let key = session
            .graph()
            .find_node_by_id(ItemId(*item))
            .with_context(|| format!("Item {} is not part of diagram {}", item, id))?;
        elements.push(Element::Node(key));
    }

    let removed = session.delete(&elements)?;
    session.save().await?;
    tracing::info!("Removed {} elements from diagram {}", removed.len(), id);

    let nodes = removed
        .iter()
        .filter(|r| matches!(r, Removed::Node(_)))
        .count();
    println!(
        "Removed {} items and {} connections from diagram {}",
        nodes,
        removed.len() - nodes,
        id
    );
    Ok(())
}
