use prometheus::{
    register_counter_with_registry, register_histogram_with_registry, Counter, Encoder,
    Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use crate::Result;

/// Metrics collector for the booking system
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Business metrics
    pub tickets_reserved: Counter,
    pub seat_conflicts: Counter,
    pub validation_failures: Counter,
    pub payments_completed: Counter,
    pub payments_repeated: Counter,
    pub movies_created: Counter,
    pub showings_created: Counter,

    // Service metrics
    pub request_duration: Histogram,
    pub error_rate: Counter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let tickets_reserved = register_counter_with_registry!(
            Opts::new("tickets_reserved_total", "Total number of tickets reserved"),
            registry
        )?;

        let seat_conflicts = register_counter_with_registry!(
            Opts::new("seat_conflicts_total", "Reservations rejected because the seat was taken"),
            registry
        )?;

        let validation_failures = register_counter_with_registry!(
            Opts::new("validation_failures_total", "Requests rejected for malformed input"),
            registry
        )?;

        let payments_completed = register_counter_with_registry!(
            Opts::new("payments_completed_total", "Tickets moved from reserved to paid"),
            registry
        )?;

        let payments_repeated = register_counter_with_registry!(
            Opts::new("payments_repeated_total", "Payment confirmations for tickets already paid"),
            registry
        )?;

        let movies_created = register_counter_with_registry!(
            Opts::new("movies_created_total", "Total number of movies created"),
            registry
        )?;

        let showings_created = register_counter_with_registry!(
            Opts::new("showings_created_total", "Total number of showings created"),
            registry
        )?;

        let request_duration = register_histogram_with_registry!(
            HistogramOpts::new("request_duration_seconds", "Time spent processing requests")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            registry
        )?;

        let error_rate = register_counter_with_registry!(
            Opts::new("errors_total", "Total number of failed requests"),
            registry
        )?;

        Ok(Self {
            registry,
            tickets_reserved,
            seat_conflicts,
            validation_failures,
            payments_completed,
            payments_repeated,
            movies_created,
            showings_created,
            request_duration,
            error_rate,
        })
    }

    /// Export metrics in Prometheus format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn record_reservation(&self, outcome: &Result<crate::domain::Ticket>) {
        match outcome {
            Ok(_) => self.tickets_reserved.inc(),
            Err(crate::BookingError::SeatConflict { .. }) => self.seat_conflicts.inc(),
            Err(crate::BookingError::Validation { .. }) => self.validation_failures.inc(),
            Err(_) => {}
        }
    }

    pub fn record_payment(&self, transitioned: bool) {
        if transitioned {
            self.payments_completed.inc();
        } else {
            self.payments_repeated.inc();
        }
    }

    /// Record service metrics
    pub fn record_request(&self, duration: std::time::Duration, success: bool) {
        self.request_duration.observe(duration.as_secs_f64());
        if !success {
            self.error_rate.inc();
        }
    }
}

/// Times every request and counts server errors.
pub async fn metrics_middleware(
    axum::extract::State(metrics): axum::extract::State<Metrics>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let start = std::time::Instant::now();
    let response = next.run(req).await;
    metrics.record_request(start.elapsed(), !response.status().is_server_error());
    response
}

/// Metrics endpoint for Prometheus scraping
pub async fn metrics_endpoint(
    axum::extract::State(metrics): axum::extract::State<Metrics>,
) -> std::result::Result<String, axum::http::StatusCode> {
    match metrics.export() {
        Ok(metrics_data) => Ok(metrics_data),
        Err(e) => {
            tracing::error!("Failed to export metrics: {}", e);
            Err(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
