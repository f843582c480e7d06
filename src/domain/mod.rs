pub mod movie;
pub mod seat_map;
pub mod showing;
pub mod ticket;

pub use movie::*;
pub use seat_map::*;
pub use showing::*;
pub use ticket::*;
