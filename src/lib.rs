pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod session;
pub mod shutdown;
pub mod store;

pub use catalog::*;
pub use crate::config::*;
pub use domain::*;
pub use error::*;
pub use lifecycle::*;
pub use metrics::Metrics;
pub use session::*;
pub use store::{CatalogStore, MemoryStore, RocksDBStore, Storage, TicketStore};
