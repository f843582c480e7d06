use crate::{BookingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ticket::{Ticket, TicketStatus};

/// Row labels are single letters, so a grid has at most 26 rows.
pub const MAX_ROWS: u16 = 26;
const MAX_ROOM_LEN: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Showing {
    pub id: u64,
    pub movie_id: u64,
    pub starts_at: DateTime<Utc>,
    pub room: String,
    pub rows: u16,
    pub columns: u16,
}

impl Showing {
    pub fn total_seats(&self) -> u32 {
        u32::from(self.rows) * u32::from(self.columns)
    }

    pub fn row_labels(&self) -> impl Iterator<Item = char> {
        (0..self.rows as u8).map(|i| (b'A' + i) as char)
    }

    pub fn last_row_label(&self) -> char {
        (b'A' + (self.rows.saturating_sub(1)) as u8) as char
    }
}

fn default_room() -> String {
    "Room 1".to_string()
}

fn default_rows() -> u16 {
    10
}

fn default_columns() -> u16 {
    12
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShowing {
    pub movie_id: u64,
    pub starts_at: DateTime<Utc>,
    #[serde(default = "default_room")]
    pub room: String,
    #[serde(default = "default_rows")]
    pub rows: u16,
    #[serde(default = "default_columns")]
    pub columns: u16,
}

impl NewShowing {
    pub fn validate(mut self) -> Result<Self> {
        self.room = self.room.trim().to_string();
        if self.room.is_empty() {
            return Err(BookingError::validation("room", "must not be empty"));
        }
        if self.room.chars().count() > MAX_ROOM_LEN {
            return Err(BookingError::validation(
                "room",
                format!("must be at most {} characters", MAX_ROOM_LEN),
            ));
        }
        if self.rows < 1 || self.rows > MAX_ROWS {
            return Err(BookingError::validation(
                "rows",
                format!("must be between 1 and {}", MAX_ROWS),
            ));
        }
        if self.columns < 1 {
            return Err(BookingError::validation("columns", "must be at least 1"));
        }
        Ok(self)
    }

    pub fn into_showing(self, id: u64) -> Showing {
        Showing {
            id,
            movie_id: self.movie_id,
            starts_at: self.starts_at,
            room: self.room,
            rows: self.rows,
            columns: self.columns,
        }
    }
}

/// A showing with its occupancy counts, as listed to browsing clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShowingSummary {
    #[serde(flatten)]
    pub showing: Showing,
    pub total_seats: u32,
    pub available_seats: u32,
    pub reserved: u32,
    pub paid: u32,
}

impl ShowingSummary {
    pub fn new(showing: Showing, tickets: &[Ticket]) -> Self {
        let (reserved, paid) = tickets
            .iter()
            .filter(|t| t.showing_id == showing.id)
            .fold((0u32, 0u32), |(reserved, paid), t| match t.status {
                TicketStatus::Reserved => (reserved + 1, paid),
                TicketStatus::Paid => (reserved, paid + 1),
            });
        let total_seats = showing.total_seats();

        Self {
            available_seats: total_seats.saturating_sub(reserved + paid),
            total_seats,
            reserved,
            paid,
            showing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewTicket, Seat};
    use chrono::TimeZone;

    fn new_showing(rows: u16, columns: u16) -> NewShowing {
        NewShowing {
            movie_id: 1,
            starts_at: Utc.with_ymd_and_hms(2026, 11, 2, 20, 0, 0).unwrap(),
            room: " Room 2 ".to_string(),
            rows,
            columns,
        }
    }

    #[test]
    fn grid_limits() {
        assert!(new_showing(0, 4).validate().is_err());
        assert!(new_showing(27, 4).validate().is_err());
        assert!(new_showing(3, 0).validate().is_err());
        let showing = new_showing(26, 1).validate().unwrap();
        assert_eq!(showing.room, "Room 2");
    }

    #[test]
    fn row_labels_follow_grid() {
        let showing = new_showing(3, 4).validate().unwrap().into_showing(1);
        assert_eq!(showing.row_labels().collect::<String>(), "ABC");
        assert_eq!(showing.last_row_label(), 'C');
        assert_eq!(showing.total_seats(), 12);
    }

    #[test]
    fn summary_counts_by_status() {
        let showing = new_showing(2, 2).validate().unwrap().into_showing(1);
        let mut paid = NewTicket {
            showing_id: 1,
            seat: Seat::new('A', 1),
            email: "a@ex.com".to_string(),
        }
        .into_ticket(1);
        paid.mark_paid();
        let reserved = NewTicket {
            showing_id: 1,
            seat: Seat::new('B', 2),
            email: "b@ex.com".to_string(),
        }
        .into_ticket(2);

        let summary = ShowingSummary::new(showing, &[paid, reserved]);
        assert_eq!(summary.total_seats, 4);
        assert_eq!(summary.available_seats, 2);
        assert_eq!(summary.reserved, 1);
        assert_eq!(summary.paid, 1);
    }
}
