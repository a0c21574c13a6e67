//! CLI entry point for the cyberkg query gateway.
//!
//! Prints JSON results on stdout. Failures print an `ErrorReport` and exit
//! non-zero; logs go to stderr.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use cyberkg_core::config::{self, Neo4jSettings};
use cyberkg_core::{CoreError, Failure, PropertyMap};
use cyberkg_graph::{GraphClient, GraphConfig, NodeUpdate, QueryGateway};

#[derive(Parser)]
#[command(name = "cyberkg-query")]
#[command(about = "Query and edit the cyberkg knowledge graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: cyberkg).
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PREFIX, global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Return up to N directed triples as nodes and edges.
    Subgraph {
        #[arg(long, default_value_t = 200)]
        limit: usize,
        /// Only triples whose source carries one of these labels.
        #[arg(long = "label")]
        labels: Vec<String>,
    },
    /// List distinct node labels and relationship types.
    NodeTypes,
    /// Patch a node's properties (JSON object on stdin).
    UpdateNode {
        #[arg(long)]
        id: String,
        /// Replace the node's labels with this one.
        #[arg(long = "type")]
        node_type: Option<String>,
    },
    /// Detach-delete a node.
    DeleteNode {
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    if let Err(Failure(report)) = run(cli).await {
        tracing::error!(kind = %report.kind, "{}", report.message);
        report.emit()?;
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Failure> {
    let cfg = config::load(&cli.config)?;
    let neo4j: Neo4jSettings = config::section(&cfg, "neo4j")?;
    let client = Arc::new(GraphClient::connect(&GraphConfig::from(neo4j)).await?);
    let gateway = QueryGateway::new(Arc::clone(&client));

    let output = match cli.command {
        Command::Subgraph { limit, labels } => {
            let sub = gateway.get_filtered_subgraph(&labels, limit).await?;
            serde_json::to_string(&sub).map_err(CoreError::from)?
        }
        Command::NodeTypes => {
            let types = gateway.get_node_types().await?;
            serde_json::to_string(&types).map_err(CoreError::from)?
        }
        Command::UpdateNode { id, node_type } => {
            let input = std::io::read_to_string(std::io::stdin()).map_err(CoreError::from)?;
            let properties: PropertyMap = if input.trim().is_empty() {
                PropertyMap::new()
            } else {
                serde_json::from_str(&input).map_err(CoreError::from)?
            };
            let node = gateway
                .update_node(
                    &id,
                    NodeUpdate {
                        properties,
                        node_type,
                    },
                )
                .await?;
            serde_json::to_string(&node).map_err(CoreError::from)?
        }
        Command::DeleteNode { id } => {
            gateway.delete_node(&id).await?;
            serde_json::json!({ "deleted": id }).to_string()
        }
    };
    println!("{output}");

    drop(gateway);
    if let Ok(client) = Arc::try_unwrap(client) {
        client.close();
    }
    Ok(())
}
