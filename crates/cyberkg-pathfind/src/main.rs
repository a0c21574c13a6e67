//! CLI entry point for the cyberkg learning path generator.
//!
//! Designed for subprocess invocation from the web backend:
//! reads a JSON request from stdin, writes a JSON result to stdout.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use cyberkg_core::config::{self as settings, Neo4jSettings};
use cyberkg_core::{CoreError, Failure};
use cyberkg_graph::{GraphClient, GraphConfig, QueryGateway};
use cyberkg_pathfind::{PathConfig, PathGenerator, PathRequest};

#[derive(Parser)]
#[command(name = "cyberkg-pathfind")]
#[command(about = "Prerequisite-ordered learning paths over the cyberkg knowledge graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: cyberkg).
    #[arg(short, long, default_value = settings::DEFAULT_CONFIG_PREFIX, global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a learning path (reads JSON from stdin).
    Generate,
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
    let cfg = settings::load(&cli.config)?;
    let neo4j: Neo4jSettings = settings::section(&cfg, "neo4j")?;
    let path_config: PathConfig = settings::section(&cfg, "path")?;

    match cli.command {
        Command::Generate => {
            let input = std::io::read_to_string(std::io::stdin()).map_err(CoreError::from)?;
            let request: PathRequest = serde_json::from_str(&input).map_err(CoreError::from)?;

            let client = Arc::new(GraphClient::connect(&GraphConfig::from(neo4j)).await?);
            let generator = PathGenerator::new(QueryGateway::new(Arc::clone(&client)))
                .with_config(path_config);
            let result = generator.generate_path(request).await;
            drop(generator);
            if let Ok(client) = Arc::try_unwrap(client) {
                client.close();
            }

            let result = result?;
            println!("{}", serde_json::to_string(&result).map_err(CoreError::from)?);
        }
    }
    Ok(())
}
