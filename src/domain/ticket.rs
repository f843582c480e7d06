use crate::{BookingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::showing::Showing;

/// A (row label, column number) coordinate inside a showing's grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Seat {
    pub row: char,
    pub column: u16,
}

impl Seat {
    pub fn new(row: char, column: u16) -> Self {
        Self { row, column }
    }

    /// Parse raw user input against a showing's grid. Row labels are case-insensitive.
    pub fn parse(showing: &Showing, row: &str, column: i64) -> Result<Self> {
        let row = parse_row_label(row)?;
        let index = (row as u8 - b'A') as u16;
        if index >= showing.rows {
            return Err(BookingError::validation(
                "row",
                format!(
                    "row {} does not exist for this showing (last row: {})",
                    row,
                    showing.last_row_label()
                ),
            ));
        }

        if column < 1 || column > i64::from(showing.columns) {
            return Err(BookingError::validation(
                "column",
                format!("seat must be between 1 and {} for this showing", showing.columns),
            ));
        }

        Ok(Self::new(row, column as u16))
    }

    /// Zero-based row index; `A` is 0.
    pub fn row_index(&self) -> usize {
        (self.row as u8 - b'A') as usize
    }

    pub fn label(&self) -> String {
        format!("{}{}", self.row, self.column)
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.column)
    }
}

fn parse_row_label(raw: &str) -> Result<char> {
    let mut chars = raw.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Ok(c.to_ascii_uppercase()),
        _ => Err(BookingError::validation("row", "must be a single letter A-Z")),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Reserved,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: u64,
    pub showing_id: u64,
    #[serde(flatten)]
    pub seat: Seat,
    pub email: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn is_paid(&self) -> bool {
        self.status == TicketStatus::Paid
    }

    /// Reserved -> Paid. Returns `false` when the ticket was already paid.
    pub fn mark_paid(&mut self) -> bool {
        match self.status {
            TicketStatus::Paid => false,
            TicketStatus::Reserved => {
                self.status = TicketStatus::Paid;
                true
            }
        }
    }

    pub fn seat_label(&self) -> String {
        self.seat.label()
    }
}

/// Ticket as returned to clients, with its printable seat label.
#[derive(Debug, Clone, Serialize)]
pub struct TicketDetails {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub seat_label: String,
}

impl From<Ticket> for TicketDetails {
    fn from(ticket: Ticket) -> Self {
        let seat_label = ticket.seat_label();
        Self { ticket, seat_label }
    }
}

/// A validated reservation ready to be written; storage assigns the id.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub showing_id: u64,
    pub seat: Seat,
    pub email: String,
}

impl NewTicket {
    pub fn into_ticket(self, id: u64) -> Ticket {
        Ticket {
            id,
            showing_id: self.showing_id,
            seat: self.seat,
            email: self.email,
            status: TicketStatus::Reserved,
            created_at: Utc::now(),
        }
    }
}

/// Requested changes to an existing ticket. Absent fields are left untouched.
/// Unknown fields are rejected rather than ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TicketChanges {
    /// Accepted only when it names the ticket's current showing.
    #[serde(default)]
    pub showing_id: Option<u64>,
    #[serde(default)]
    pub row: Option<String>,
    #[serde(default)]
    pub column: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
}

impl TicketChanges {
    pub fn touches_seat(&self) -> bool {
        self.row.is_some() || self.column.is_some()
    }
}

/// Accepts `local@domain.tld` without whitespace; returns the trimmed address.
pub fn validate_email(raw: &str) -> Result<String> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(BookingError::validation("email", "is required"));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(email.to_string())
    } else {
        Err(BookingError::validation(
            "email",
            format!("{} is not a valid email address", email),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn showing(rows: u16, columns: u16) -> Showing {
        Showing {
            id: 1,
            movie_id: 1,
            starts_at: Utc.with_ymd_and_hms(2026, 11, 2, 20, 0, 0).unwrap(),
            room: "Room 1".to_string(),
            rows,
            columns,
        }
    }

    #[test]
    fn row_is_uppercased() {
        let seat = Seat::parse(&showing(3, 4), "b", 4).unwrap();
        assert_eq!(seat, Seat::new('B', 4));
        assert_eq!(seat.label(), "B4");
    }

    #[test]
    fn column_bounds() {
        let showing = showing(3, 4);
        assert!(Seat::parse(&showing, "A", 0).is_err());
        assert!(Seat::parse(&showing, "A", 5).is_err());
        assert!(Seat::parse(&showing, "A", -1).is_err());
        assert!(Seat::parse(&showing, "A", 1).is_ok());
        assert!(Seat::parse(&showing, "A", 4).is_ok());
    }

    #[test]
    fn row_bounds_and_shape() {
        let showing = showing(3, 4);
        assert!(Seat::parse(&showing, "C", 1).is_ok());
        assert!(matches!(
            Seat::parse(&showing, "D", 1),
            Err(BookingError::Validation { field: "row", .. })
        ));
        assert!(Seat::parse(&showing, "", 1).is_err());
        assert!(Seat::parse(&showing, "AB", 1).is_err());
        assert!(Seat::parse(&showing, "1", 1).is_err());
        assert!(Seat::parse(&showing, "Ñ", 1).is_err());
    }

    #[test]
    fn mark_paid_only_transitions_once() {
        let mut ticket = NewTicket {
            showing_id: 1,
            seat: Seat::new('A', 1),
            email: "x@y.com".to_string(),
        }
        .into_ticket(7);

        assert_eq!(ticket.status, TicketStatus::Reserved);
        assert!(ticket.mark_paid());
        assert!(!ticket.mark_paid());
        assert!(ticket.is_paid());
    }

    #[test]
    fn ticket_json_flattens_seat() {
        let ticket = NewTicket {
            showing_id: 3,
            seat: Seat::new('C', 2),
            email: "p@p.com".to_string(),
        }
        .into_ticket(9);

        let value = serde_json::to_value(&ticket).unwrap();
        assert_eq!(value["row"], "C");
        assert_eq!(value["column"], 2);
        assert_eq!(value["status"], "reserved");

        let details = serde_json::to_value(TicketDetails::from(ticket)).unwrap();
        assert_eq!(details["seat_label"], "C2");
        assert_eq!(details["row"], "C");
        assert_eq!(details["id"], 9);
    }

    #[test]
    fn changes_reject_unknown_fields() {
        let parsed: std::result::Result<TicketChanges, _> =
            serde_json::from_str(r#"{"sesion": 4}"#);
        assert!(parsed.is_err());

        let changes: TicketChanges = serde_json::from_str(r#"{"showing_id": 4}"#).unwrap();
        assert_eq!(changes.showing_id, Some(4));
        assert!(!changes.touches_seat());
    }

    #[test]
    fn email_shapes() {
        assert_eq!(validate_email(" x@y.com ").unwrap(), "x@y.com");
        assert!(validate_email("").is_err());
        assert!(validate_email("nobody").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a b@c.com").is_err());
        assert!(validate_email("@c.com").is_err());
    }
}
