use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::showing::Showing;
use super::ticket::{Seat, Ticket, TicketStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeatMapMode {
    /// Each cell reports `free`, `reserved` or `paid`.
    Detailed,
    /// Each cell reports a boolean `occupied` flag.
    Summary,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeatState {
    Free,
    Reserved,
    Paid,
}

impl From<TicketStatus> for SeatState {
    fn from(status: TicketStatus) -> Self {
        match status {
            TicketStatus::Reserved => Self::Reserved,
            TicketStatus::Paid => Self::Paid,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CellOccupancy {
    Status { status: SeatState },
    Occupied { occupied: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatCell {
    #[serde(flatten)]
    pub seat: Seat,
    #[serde(flatten)]
    pub occupancy: CellOccupancy,
}

impl SeatCell {
    pub fn is_occupied(&self) -> bool {
        match self.occupancy {
            CellOccupancy::Status { status } => status != SeatState::Free,
            CellOccupancy::Occupied { occupied } => occupied,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatMap {
    pub showing_id: u64,
    pub movie_id: u64,
    pub rows: u16,
    pub columns: u16,
    pub layout: Vec<Vec<SeatCell>>,
    pub generated_at: DateTime<Utc>,
}

impl SeatMap {
    /// Join the showing's grid with its tickets. Tickets of other showings are ignored.
    pub fn project(showing: &Showing, tickets: &[Ticket], mode: SeatMapMode) -> Self {
        let taken: HashMap<Seat, TicketStatus> = tickets
            .iter()
            .filter(|t| t.showing_id == showing.id)
            .map(|t| (t.seat, t.status))
            .collect();

        let layout = showing
            .row_labels()
            .map(|row| {
                (1..=showing.columns)
                    .map(|column| {
                        let seat = Seat::new(row, column);
                        let status = taken.get(&seat).copied();
                        let occupancy = match mode {
                            SeatMapMode::Detailed => CellOccupancy::Status {
                                status: status.map(SeatState::from).unwrap_or(SeatState::Free),
                            },
                            SeatMapMode::Summary => CellOccupancy::Occupied {
                                occupied: status.is_some(),
                            },
                        };
                        SeatCell { seat, occupancy }
                    })
                    .collect()
            })
            .collect();

        Self {
            showing_id: showing.id,
            movie_id: showing.movie_id,
            rows: showing.rows,
            columns: showing.columns,
            layout,
            generated_at: Utc::now(),
        }
    }

    pub fn cell(&self, seat: Seat) -> Option<&SeatCell> {
        self.layout
            .get(seat.row_index())
            .and_then(|row| row.get(usize::from(seat.column).checked_sub(1)?))
    }

    /// Detailed state of a seat; `None` outside the grid or in summary mode.
    pub fn state(&self, seat: Seat) -> Option<SeatState> {
        match self.cell(seat)?.occupancy {
            CellOccupancy::Status { status } => Some(status),
            CellOccupancy::Occupied { .. } => None,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = &SeatCell> {
        self.layout.iter().flatten()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells().filter(|cell| cell.is_occupied()).count()
    }
}
