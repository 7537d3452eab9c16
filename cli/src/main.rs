//! EstateHub command line
//!
//! The persisted user-visible surface: index setup and the demo runner.
//! Exit codes: 0 success, 2 usage error, 3 backend unavailable, 4 partial
//! failure (non-zero failed counts).

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use estatehub_config::{telemetry, AppConfig};
use estatehub_indexer::{BulkIndexer, HttpEmbeddingProvider, RelationshipBuilder};
use estatehub_models::EntityKind;
use estatehub_search::demos::results::{DemoFailure, FailureResult, Render};
use estatehub_search::demos::{DemoContext, DemoRegistry};
use estatehub_search::{Cancellation, HybridSearchEngine, MappingCatalog, SearchBackend, SearchError};

const EXIT_BACKEND_UNAVAILABLE: u8 = 3;
const EXIT_PARTIAL_FAILURE: u8 = 4;

#[derive(Parser)]
#[command(name = "estatehub", about = "Real-estate knowledge discovery engine", version)]
struct Cli {
    /// Path to estatehub.yaml (defaults to ./estatehub.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage search indices
    Indices {
        #[command(subcommand)]
        command: IndicesCommand,
    },
    /// Run and list search demos
    Demo {
        #[command(subcommand)]
        command: DemoCommand,
    },
}

#[derive(Subcommand)]
enum IndicesCommand {
    /// Create the primary indices (and optionally the relationships index)
    Setup {
        /// Delete and recreate indices that already exist
        #[arg(long)]
        clear: bool,
        /// Rebuild the denormalized property-relationships index afterwards
        #[arg(long)]
        rebuild_relationships: bool,
    },
}

#[derive(Subcommand)]
enum DemoCommand {
    /// List registered demos
    List,
    /// Execute one demo by number
    Run {
        id: u16,
        /// Result size
        #[arg(long, default_value_t = 10)]
        size: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init_tracing("estatehub");

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    let backend = match SearchBackend::new(&config.search_backend) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            error!("backend setup failed: {}", e);
            return ExitCode::from(EXIT_BACKEND_UNAVAILABLE);
        }
    };

    match cli.command {
        Command::Indices { command: IndicesCommand::Setup { clear, rebuild_relationships } } => {
            setup_indices(&config, backend, clear, rebuild_relationships).await
        }
        Command::Demo { command: DemoCommand::List } => {
            list_demos();
            ExitCode::SUCCESS
        }
        Command::Demo { command: DemoCommand::Run { id, size } } => {
            run_demo(&config, backend, id, size).await
        }
    }
}

async fn require_backend(backend: &SearchBackend) -> Result<(), ExitCode> {
    match backend.health().await {
        Ok(status) => {
            info!("search backend reachable (status: {})", status);
            Ok(())
        }
        Err(e) => {
            error!("search backend unavailable: {}", e);
            Err(ExitCode::from(EXIT_BACKEND_UNAVAILABLE))
        }
    }
}

async fn setup_indices(
    config: &AppConfig,
    backend: Arc<SearchBackend>,
    clear: bool,
    rebuild_relationships: bool,
) -> ExitCode {
    if let Err(code) = require_backend(&backend).await {
        return code;
    }

    let catalog = MappingCatalog::new(&config.embedding, &config.hybrid);
    let indexer = BulkIndexer::new(
        backend.clone(),
        catalog.clone(),
        config.indices.clone(),
        100,
    );

    for kind in [EntityKind::Property, EntityKind::Neighborhood, EntityKind::Wikipedia] {
        if let Err(e) = indexer.ensure_index(kind, clear).await {
            error!("failed to set up '{}' index: {}", kind.as_str(), e);
            return ExitCode::FAILURE;
        }
        let name = indexer.index_name(kind);
        let count = backend.count(name).await.unwrap_or(0);
        info!("index '{}' ready ({} docs)", name, count);
    }

    if rebuild_relationships {
        let builder = RelationshipBuilder::new(
            backend.clone(),
            catalog,
            config.indices.clone(),
            config.relationships,
        );
        match builder.build(true, &Cancellation::new()).await {
            Ok(stats) => {
                info!(
                    "relationships: scanned={} written={} skipped={} failed={}",
                    stats.scanned, stats.written, stats.skipped_no_neighborhood, stats.failed
                );
                if stats.failed > 0 {
                    return ExitCode::from(EXIT_PARTIAL_FAILURE);
                }
            }
            Err(e) => {
                error!("relationship build failed: {}", e);
                return exit_for(&e);
            }
        }
    }

    ExitCode::SUCCESS
}

fn list_demos() {
    let registry = DemoRegistry::standard();
    println!("{:<4} {:<22} {:<13} description", "#", "name", "category");
    for demo in registry.iter() {
        let spec = demo.spec();
        println!(
            "{:<4} {:<22} {:<13} {}",
            spec.number,
            spec.name,
            spec.category.as_str(),
            spec.description
        );
    }
}

async fn run_demo(config: &AppConfig, backend: Arc<SearchBackend>, id: u16, size: usize) -> ExitCode {
    let registry = DemoRegistry::standard();
    let Some(demo) = registry.get(id) else {
        eprintln!("unknown demo id {}; see `estatehub demo list`", id);
        return ExitCode::from(2);
    };

    if let Err(code) = require_backend(&backend).await {
        return code;
    }

    let embedder = match HttpEmbeddingProvider::new(&config.embedding) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            error!("embedding provider setup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let engine = HybridSearchEngine::new(
        backend.clone(),
        embedder,
        config.hybrid,
        config.indices.property.clone(),
    );
    let ctx = DemoContext {
        backend,
        engine,
        indices: config.indices.clone(),
        hybrid: config.hybrid,
        cancel: Cancellation::new(),
    };

    let spec = demo.spec();
    info!("running demo {} ({})", spec.number, spec.name);

    let mut stdout = std::io::stdout().lock();
    match demo.run(&ctx, size).await {
        Ok(result) => {
            if result.render(&mut stdout).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let failure = FailureResult {
                title: spec.name.to_string(),
                failure: DemoFailure::from_error(&e),
            };
            let _ = failure.render(&mut stdout);
            let _ = stdout.flush();
            exit_for(&e)
        }
    }
}

fn exit_for(error: &SearchError) -> ExitCode {
    match error {
        SearchError::Transport(_) => ExitCode::from(EXIT_BACKEND_UNAVAILABLE),
        _ => ExitCode::FAILURE,
    }
}
