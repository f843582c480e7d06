use anyhow::Context;
use clap::{Parser, ValueEnum};
use cine_booking::shutdown::{shutdown_signal, ShutdownCoordinator, StorageShutdown};
use cine_booking::{store, AppConfig, StorageBackend};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod service;

use service::BookingService;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Memory,
    Rocksdb,
}

impl From<Backend> for StorageBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Memory => StorageBackend::Memory,
            Backend::Rocksdb => StorageBackend::Rocksdb,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "booking-service")]
#[command(about = "Cinema seat booking REST API")]
struct Args {
    /// Port to listen on
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Config file path
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Storage backend
    #[arg(long = "backend", value_enum)]
    backend: Option<Backend>,

    /// RocksDB data directory
    #[arg(long = "storage-path")]
    storage_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(backend) = args.backend {
        config.storage.backend = backend.into();
    }
    if let Some(path) = args.storage_path {
        config.storage.path = path;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.filter.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting booking service");
    if let Some(path) = &args.config {
        info!("Config file: {:?}", path);
    }

    let store = store::open(&config.storage).context("opening storage")?;
    let booking_service = BookingService::new(store.clone())?;

    let coordinator =
        ShutdownCoordinator::new(Duration::from_secs(config.server.shutdown_timeout_secs));
    coordinator
        .register_component(Box::new(StorageShutdown::new(store)))
        .await;

    let app = api::router(booking_service);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Booking service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = coordinator.shutdown().await {
        error!("Graceful shutdown failed: {}", e);
    }
    info!("Booking service stopped");

    Ok(())
}
