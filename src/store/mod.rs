//! Persistence boundary for the catalog and ticket lifecycle.
//!
//! Every method that enforces a uniqueness rule does so atomically inside the
//! backend: callers never check a seat (or a room slot) before writing it.

pub mod keys;
pub mod locks;
pub mod memory;
pub mod rocksdb_store;

pub use memory::MemoryStore;
pub use rocksdb_store::RocksDBStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::domain::{Movie, NewMovie, NewShowing, NewTicket, Seat, Showing, Ticket};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Result of the conditional Reserved -> Paid update.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub ticket: Ticket,
    /// `false` when the ticket was already paid and nothing was written.
    pub transitioned: bool,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_movie(&self, movie: NewMovie) -> Result<Movie>;

    async fn get_movie(&self, id: u64) -> Result<Option<Movie>>;

    async fn list_movies(&self) -> Result<Vec<Movie>>;

    /// Fails with `ShowingConflict` when the room already has a showing at that start time.
    async fn insert_showing(&self, showing: NewShowing) -> Result<Showing>;

    async fn get_showing(&self, id: u64) -> Result<Option<Showing>>;

    async fn list_showings(&self) -> Result<Vec<Showing>>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Insert-if-absent on (showing, row, column). Fails with `SeatConflict` on collision.
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket>;

    async fn get_ticket(&self, id: u64) -> Result<Option<Ticket>>;

    /// Atomic "set Paid where Reserved, no-op if already Paid". `None` for unknown tickets.
    async fn mark_paid(&self, id: u64) -> Result<Option<PaymentOutcome>>;

    /// Move a reserved ticket to another seat of the same showing, releasing the old one.
    /// Fails with `Validation` if the ticket is paid and `SeatConflict` if the seat is taken.
    async fn move_seat(&self, id: u64, seat: Seat) -> Result<Option<Ticket>>;

    async fn update_email(&self, id: u64, email: String) -> Result<Option<Ticket>>;

    async fn tickets_for_showing(&self, showing_id: u64) -> Result<Vec<Ticket>>;

    /// Every ticket, newest first.
    async fn list_tickets(&self) -> Result<Vec<Ticket>>;
}

pub trait Storage: CatalogStore + TicketStore {
    fn backend(&self) -> &'static str;

    fn flush(&self) -> Result<()>;
}

pub fn open(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    let store: Arc<dyn Storage> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Rocksdb => {
            std::fs::create_dir_all(&config.path)?;
            Arc::new(RocksDBStore::open(
                &config.path,
                Duration::from_millis(config.lock_timeout_ms),
            )?)
        }
    };
    tracing::info!(backend = store.backend(), "Storage opened");
    Ok(store)
}

pub(crate) fn paid_seat_locked(ticket: &Ticket) -> crate::BookingError {
    crate::BookingError::validation(
        "seat",
        format!("ticket {} is paid; its seat can no longer be changed", ticket.id),
    )
}
