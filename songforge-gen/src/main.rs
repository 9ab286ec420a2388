//! songforge-gen - generation worker binary
//!
//! Resolves configuration, opens the database, wires the port adapters into
//! the orchestration service, and runs the queue worker until interrupted.

use anyhow::Result;
use clap::Parser;
use songforge_common::config::TomlConfig;
use songforge_common::EventBus;
use songforge_gen::config::GenConfig;
use songforge_gen::db::jobs::SqliteJobQueue;
use songforge_gen::db::songs::SqliteSongRepository;
use songforge_gen::services::{GenerationWorker, HttpMusicBackend, R2ArtifactStore, SongService};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(name = "songforge-gen", about = "AI music generation worker")]
struct Args {
    /// Root folder holding the database (overrides SONGFORGE_ROOT and config)
    #[arg(long)]
    root_folder: Option<String>,

    /// Queue poll interval in milliseconds (overrides config)
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting songforge-gen (generation worker)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve root folder and configuration
    let root_folder = songforge_common::config::resolve_root_folder(args.root_folder.as_deref());
    info!("Root folder: {}", root_folder.display());

    let toml_config = TomlConfig::load_default();
    let mut config = GenConfig::resolve(&root_folder, &toml_config)?;
    if let Some(ms) = args.poll_interval_ms {
        config.worker.poll_interval_ms = ms;
    }

    // Step 2: Open or create the database
    let pool = songforge_gen::db::init_database_pool(&config.database_path).await?;
    info!("Database: {}", config.database_path.display());

    // Step 3: Wire the port adapters
    let repository = Arc::new(SqliteSongRepository::new(pool.clone()));
    let queue = SqliteJobQueue::new(pool.clone(), config.worker.max_attempts);
    let backend = Arc::new(HttpMusicBackend::new(config.backend.clone())?);
    let storage = Arc::new(R2ArtifactStore::new(&config.storage)?);
    let events = EventBus::new(100);

    // Backend reachability is logged, not fatal: jobs simply fail and
    // redeliver while the backend is down.
    if let Err(e) = backend.health().await {
        warn!("Generation backend health probe failed: {}", e);
    }

    let service = Arc::new(SongService::new(
        repository,
        backend,
        Arc::new(queue.clone()),
        storage,
        events,
    ));

    // Step 4: Run the worker until interrupted
    let worker = GenerationWorker::new(
        queue,
        service,
        Duration::from_millis(config.worker.poll_interval_ms),
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    worker.run(shutdown).await;
    Ok(())
}
