//! CLI entry point for the cyberkg bundle importer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use cyberkg_core::config::{self as settings, Neo4jSettings};
use cyberkg_core::{CoreError, Failure};
use cyberkg_graph::{GraphClient, GraphConfig, GraphStore, MemoryGraphStore};

use cyberkg_import::{BundleImporter, ImportConfig};

#[derive(Parser)]
#[command(name = "cyberkg-import")]
#[command(about = "Load ATT&CK bundles into the cyberkg knowledge graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file prefix (default: cyberkg).
    #[arg(short, long, default_value = settings::DEFAULT_CONFIG_PREFIX, global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Import techniques, tactics and their links from a bundle.
    Import {
        #[arg(long)]
        bundle: PathBuf,
        /// Clear the store first.
        #[arg(long)]
        clear: bool,
        /// Import into an in-memory store instead of Neo4j.
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove every node and edge.
    Clear,
    /// Print node and edge counts.
    Verify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    if let Err(Failure(report)) = run(cli).await {
        tracing::error!(kind = %report.kind, "{}", report.message);
        report.emit()?;
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Failure> {
    let cfg = settings::load(&cli.config)?;
    let import_config: ImportConfig = settings::section(&cfg, "import")?;

    if let Command::Import {
        bundle,
        clear,
        dry_run: true,
    } = &cli.command
    {
        tracing::info!("Dry run: importing into an in-memory store");
        let store = Arc::new(MemoryGraphStore::new());
        return execute(store, import_config, bundle, *clear).await;
    }

    let neo4j: Neo4jSettings = settings::section(&cfg, "neo4j")?;
    let client = Arc::new(GraphClient::connect(&GraphConfig::from(neo4j)).await?);

    let outcome = match &cli.command {
        Command::Import { bundle, clear, .. } => {
            execute(Arc::clone(&client), import_config, bundle, *clear).await
        }
        Command::Clear => {
            let importer = BundleImporter::new(Arc::clone(&client), import_config);
            let removed = importer.clear().await?;
            print_json(&serde_json::json!({ "removed": removed }))
        }
        Command::Verify => {
            let importer = BundleImporter::new(Arc::clone(&client), import_config);
            let stats = importer.verify().await?;
            print_json(&stats)
        }
    };

    if let Ok(client) = Arc::try_unwrap(client) {
        client.close();
    }
    outcome
}

async fn execute<S: GraphStore + 'static>(
    store: Arc<S>,
    config: ImportConfig,
    bundle: &Path,
    clear: bool,
) -> Result<(), Failure> {
    let importer = BundleImporter::new(store, config);
    let report = if clear {
        importer.clear_and_import(bundle).await?
    } else {
        importer.import_core(bundle).await?
    };
    print_json(&report)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Failure> {
    let text = serde_json::to_string(value).map_err(CoreError::from)?;
    println!("{text}");
    Ok(())
}
