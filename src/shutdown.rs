use crate::store::Storage;
use crate::{BookingError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{error, info};

/// Graceful shutdown coordinator
#[derive(Clone)]
pub struct ShutdownCoordinator {
    components: Arc<Mutex<Vec<Box<dyn ShutdownComponent + Send + Sync>>>>,
    shutdown_timeout: Duration,
}

/// Trait for components that need graceful shutdown
#[async_trait::async_trait]
pub trait ShutdownComponent {
    async fn shutdown(&self) -> Result<()>;
    fn name(&self) -> &str;
}

impl ShutdownCoordinator {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            components: Arc::new(Mutex::new(Vec::new())),
            shutdown_timeout,
        }
    }

    /// Register a component for graceful shutdown
    pub async fn register_component(&self, component: Box<dyn ShutdownComponent + Send + Sync>) {
        let mut components = self.components.lock().await;
        info!("Registering component '{}' for graceful shutdown", component.name());
        components.push(component);
    }

    /// Shut down every registered component, in registration order, within the timeout.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown...");

        let components = self.components.lock().await;
        let shutdown_all = async {
            let mut failures = 0;
            for component in components.iter() {
                info!("Shutting down component '{}'", component.name());
                match component.shutdown().await {
                    Ok(()) => info!("Component '{}' shutdown successfully", component.name()),
                    Err(e) => {
                        error!("Component '{}' shutdown failed: {}", component.name(), e);
                        failures += 1;
                    }
                }
            }
            failures
        };

        match tokio::time::timeout(self.shutdown_timeout, shutdown_all).await {
            Ok(0) => {
                info!("All components shutdown successfully");
                Ok(())
            }
            Ok(failures) => Err(BookingError::Shutdown(format!(
                "{} component(s) failed to shut down",
                failures
            ))),
            Err(_) => {
                error!("Shutdown timeout exceeded, forcing exit");
                Err(BookingError::Shutdown(format!(
                    "timeout of {:?} exceeded",
                    self.shutdown_timeout
                )))
            }
        }
    }
}

/// Flushes the storage backend on shutdown.
pub struct StorageShutdown {
    store: Arc<dyn Storage>,
}

impl StorageShutdown {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl ShutdownComponent for StorageShutdown {
    async fn shutdown(&self) -> Result<()> {
        info!("Flushing {} storage...", self.store.backend());
        self.store.flush()?;
        info!("Storage flushed successfully");
        Ok(())
    }

    fn name(&self) -> &str {
        "storage"
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to setup SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
