//! # Legal RAG Engine Main Driver
//!
//! ## Purpose
//! Main entry point for the legal RAG server. Wires configuration, storage,
//! embedding and generation collaborators, and the retrieval engine together,
//! optionally runs ingestion, then serves the API.
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Open storage and build the vector index, fallback index, and history
//! 4. Optionally ingest the dataset into the vector index
//! 5. Start the API server and wait for a shutdown signal

use clap::{Arg, Command};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use legal_rag_engine::{
    api::ApiServer,
    chat::ChatHistoryStore,
    config::Config,
    embedding::build_embedder,
    engine::RagEngine,
    errors::{RagError, Result},
    fallback::FallbackContextIndex,
    generation::OllamaGenerator,
    ingestion::{load_case_documents, load_case_metadata},
    vector::VectorIndex,
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("legal-rag-server")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Legal Search Team")
        .about("Retrieval-augmented question answering over court case collections")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("ingest")
                .long("ingest")
                .help("Ingest the dataset into the vector index before serving")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check-health")
                .long("check-health")
                .help("Run health checks and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").expect("has default");
    let mut config = Config::from_file(config_path)?;

    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    let config = Arc::new(config);

    init_logging(&config)?;

    info!("Starting Legal RAG Engine v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", config_path);

    if matches.get_flag("check-health") {
        return run_health_checks(&config).await;
    }

    let app_state = initialize_components(config.clone()).await?;

    if matches.get_flag("ingest") {
        info!("Ingesting dataset from {:?}", config.ingestion.dataset_dir);
        let documents = load_case_documents(
            &config.ingestion.dataset_dir,
            &config.ingestion.metadata_file_name,
        )?;
        let stats = app_state.engine.ingest(documents).await?;
        info!(
            "Ingested {} documents into {} chunks ({} skipped)",
            stats.documents_indexed, stats.chunks_indexed, stats.documents_skipped
        );
    }

    let server = ApiServer::new(app_state.clone());
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {}", e);
        }
    });

    info!(
        "Legal RAG Engine started on {}:{}",
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

    info!("Legal RAG Engine shut down successfully");
    Ok(())
}

/// Initialize logging and tracing
fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.logging.level).map_err(|_| RagError::Config {
        message: format!("Invalid log level: {}", config.logging.level),
    })?;

    if config.logging.json_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Logging initialized with level: {}", config.logging.level);
    Ok(())
}

/// Initialize all application components
async fn initialize_components(config: Arc<Config>) -> Result<AppState> {
    info!("Initializing application components...");

    if let Some(parent) = config.storage.db_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
            info!("Created directory: {:?}", parent);
        }
    }

    let db = sled::open(&config.storage.db_path)?;
    let index = Arc::new(VectorIndex::open(&db, config.storage.enable_compression)?);
    let history = Arc::new(ChatHistoryStore::open(&db)?);

    let embedder = build_embedder(&config.embedding)?;
    info!("Embedding backend: {}", embedder.name());
    let generator = Arc::new(OllamaGenerator::new(&config.generation)?);

    let fallback = match load_case_metadata(
        &config.ingestion.dataset_dir,
        &config.ingestion.metadata_file_name,
    ) {
        Ok(cases) => FallbackContextIndex::build(&cases),
        Err(e) => {
            warn!("Fallback index unavailable, continuing without it: {}", e);
            FallbackContextIndex::build(&[])
        }
    };

    let engine = Arc::new(RagEngine::new(
        config.clone(),
        embedder,
        generator,
        index,
        fallback,
        history,
    ));

    info!("All components initialized successfully");
    Ok(AppState { config, engine })
}

/// Run startup health checks
async fn run_health_checks(config: &Config) -> Result<()> {
    info!("Running health checks...");
    info!("✓ Configuration is valid");

    if let Some(parent) = config.storage.db_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
            info!("Created directory: {:?}", parent);
        }
    }
    info!("✓ Storage path is accessible");

    let embedder = build_embedder(&config.embedding)?;
    embedder.health_check().await?;
    info!("✓ Embedding backend '{}' is reachable", embedder.name());

    info!("All health checks passed!");
    Ok(())
}
