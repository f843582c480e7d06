// Key layout for the ordered key-value backend. Ids are zero padded so that
// lexicographic order matches numeric order.

use crate::domain::Seat;
use chrono::{DateTime, SecondsFormat, Utc};

pub const MOVIE_PREFIX: &str = "movie:";
pub const SHOWING_PREFIX: &str = "showing:";
pub const TICKET_PREFIX: &str = "ticket:";
pub const SEAT_PREFIX: &str = "seat:";
pub const SLOT_PREFIX: &str = "slot:";

pub fn movie_key(id: u64) -> String {
    format!("{}{:020}", MOVIE_PREFIX, id)
}

pub fn showing_key(id: u64) -> String {
    format!("{}{:020}", SHOWING_PREFIX, id)
}

pub fn ticket_key(id: u64) -> String {
    format!("{}{:020}", TICKET_PREFIX, id)
}

/// All seats of one showing share this prefix.
pub fn showing_seats_prefix(showing_id: u64) -> String {
    format!("{}{:020}#", SEAT_PREFIX, showing_id)
}

pub fn seat_key(showing_id: u64, seat: Seat) -> String {
    format!("{}{}{:05}", showing_seats_prefix(showing_id), seat.row, seat.column)
}

/// Room names are compared exactly and start times at full precision.
pub fn slot_key(starts_at: &DateTime<Utc>, room: &str) -> String {
    format!(
        "{}{}#{}",
        SLOT_PREFIX,
        starts_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        room
    )
}

/// Parse the numeric id back out of a `prefix + padded id` key.
pub fn id_from_key(prefix: &str, key: &[u8]) -> Option<u64> {
    std::str::from_utf8(key).ok()?.strip_prefix(prefix)?.parse().ok()
}
