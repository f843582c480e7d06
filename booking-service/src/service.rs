use cine_booking::{CatalogService, Metrics, Result, Storage, TicketLifecycleManager};
use std::sync::Arc;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct BookingService {
    pub catalog: CatalogService,
    pub tickets: TicketLifecycleManager,
    pub metrics: Metrics,
}

impl BookingService {
    pub fn new(store: Arc<dyn Storage>) -> Result<Self> {
        let metrics = Metrics::new()?;
        Ok(Self {
            catalog: CatalogService::new(store.clone(), metrics.clone()),
            tickets: TicketLifecycleManager::new(store, metrics.clone()),
            metrics,
        })
    }
}

impl axum::extract::FromRef<BookingService> for Metrics {
    fn from_ref(service: &BookingService) -> Self {
        service.metrics.clone()
    }
}
