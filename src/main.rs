//! # Legal Retrieval Server Main Driver
//!
//! ## Purpose
//! Entry point for the hybrid legal retrieval server. Loads configuration,
//! builds the index snapshot from the corpus file, wires the engine and API
//! server together, and handles graceful shutdown.
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Load the corpus and build the index snapshot
//! 4. Optionally ingest the citation graph
//! 5. Start the API server and wait for a shutdown signal

use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hybrid_legal_retrieval::api::ApiServer;
use hybrid_legal_retrieval::config::Config;
use hybrid_legal_retrieval::corpus::load_corpus;
use hybrid_legal_retrieval::engine::RetrievalEngine;
use hybrid_legal_retrieval::errors::{Result, RetrievalError};
use hybrid_legal_retrieval::graph::{GraphStore, MemoryGraphStore};
use hybrid_legal_retrieval::semantic::{EmbeddingModel, HashEmbedder};
use hybrid_legal_retrieval::AppState;

/// Hybrid legal retrieval server
#[derive(Debug, Parser)]
#[command(name = "legal-retrieval-server", version, about)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Corpus file path (JSON)
    #[arg(long, default_value = "corpus.json")]
    corpus: String,

    /// Server port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Run health checks and exit
    #[arg(long)]
    check_health: bool,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_file(&args.config)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    let config = Arc::new(config);

    init_logging(&config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting legal retrieval server");
    info!("Configuration loaded from: {}", args.config);

    let app_state = initialize_components(config.clone(), &args.corpus).await?;

    if args.check_health {
        app_state.engine.health_check().await?;
        info!("All health checks passed");
        return Ok(());
    }

    let server = ApiServer::new(app_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {}", e);
        }
    });

    info!(
        "Legal retrieval server started on {}:{}",
        config.server.host, config.server.port
    );

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = server_handle => {
            warn!("Server stopped unexpectedly");
        }
    }

    info!("Legal retrieval server shut down");
    Ok(())
}

/// Initialize logging and tracing
fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .map_err(|_| RetrievalError::Config {
            message: format!("Invalid log level: {}", config.logging.level),
        })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Load the corpus, build the engine, and ingest the citation graph when the
/// graph signal is enabled.
async fn initialize_components(config: Arc<Config>, corpus_path: &str) -> Result<AppState> {
    info!("Loading corpus from {}", corpus_path);
    let corpus = load_corpus(corpus_path)?;

    // The embedding model is a pluggable external interface; the hashing
    // embedder stands in until a real model client is wired up.
    let model: Arc<dyn EmbeddingModel> =
        Arc::new(HashEmbedder::new(config.index.embedding_dimension));

    let graph_store: Option<Arc<dyn GraphStore>> = if config.graph.enabled {
        Some(Arc::new(MemoryGraphStore::new()))
    } else {
        None
    };

    info!("Building index snapshot...");
    let engine = Arc::new(
        RetrievalEngine::build(config.clone(), corpus, model, graph_store).await?,
    );

    if config.graph.enabled {
        let count = engine.ingest_citations().await?;
        info!(documents = count, "Citation graph ingested");
    }

    engine.health_check().await?;
    info!("All components initialized successfully");

    Ok(AppState { config, engine })
}
