use crate::domain::Seat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Seat {seat} is already reserved or paid for showing {showing_id}")]
    SeatConflict { showing_id: u64, seat: Seat },

    #[error("Room {room} already has a showing starting at {starts_at}")]
    ShowingConflict { room: String, starts_at: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("{entity} {id} is locked by a concurrent update")]
    Busy { entity: &'static str, id: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

impl BookingError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Errors the caller can fix by correcting input or choosing another seat.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::SeatConflict { .. }
                | Self::ShowingConflict { .. }
                | Self::NotFound { .. }
                | Self::Busy { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
