use crate::domain::{Seat, Showing, Ticket};
use crate::lifecycle::{ReserveRequest, TicketLifecycleManager};
use crate::{BookingError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Browsing and checkout state for one guest, passed explicitly through
/// the booking flow instead of living in a global.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingSession {
    movie_id: Option<u64>,
    showing: Option<Showing>,
    selected: BTreeSet<Seat>,
    tickets: Vec<Ticket>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutReport {
    pub reserved: Vec<Ticket>,
    /// Seats someone else took first; the guest should pick again.
    pub conflicts: Vec<Seat>,
}

impl BookingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn movie_id(&self) -> Option<u64> {
        self.movie_id
    }

    pub fn showing(&self) -> Option<&Showing> {
        self.showing.as_ref()
    }

    pub fn selected_seats(&self) -> impl Iterator<Item = &Seat> {
        self.selected.iter()
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    /// Switching movies drops the showing and seat selection.
    pub fn select_movie(&mut self, movie_id: u64) {
        if self.movie_id != Some(movie_id) {
            self.movie_id = Some(movie_id);
            self.showing = None;
            self.selected.clear();
        }
    }

    pub fn select_showing(&mut self, showing: Showing) -> Result<()> {
        match self.movie_id {
            Some(movie_id) if movie_id == showing.movie_id => {}
            Some(movie_id) => {
                return Err(BookingError::validation(
                    "showing_id",
                    format!("showing {} is not a screening of movie {}", showing.id, movie_id),
                ))
            }
            None => self.movie_id = Some(showing.movie_id),
        }

        if self.showing.as_ref().map(|s| s.id) != Some(showing.id) {
            self.selected.clear();
        }
        self.showing = Some(showing);
        Ok(())
    }

    /// Add the seat to the selection, or remove it if already selected.
    /// Returns whether the seat is selected afterwards.
    pub fn toggle_seat(&mut self, row: &str, column: i64) -> Result<bool> {
        let showing = self
            .showing
            .as_ref()
            .ok_or_else(|| BookingError::validation("showing_id", "no showing selected"))?;
        let seat = Seat::parse(showing, row, column)?;

        if self.selected.remove(&seat) {
            Ok(false)
        } else {
            self.selected.insert(seat);
            Ok(true)
        }
    }

    /// Reserve every selected seat. Conflicts are collected per seat; any
    /// other failure aborts the checkout and keeps the remaining selection.
    pub async fn checkout(
        &mut self,
        manager: &TicketLifecycleManager,
        email: &str,
    ) -> Result<CheckoutReport> {
        let showing_id = self
            .showing
            .as_ref()
            .map(|s| s.id)
            .ok_or_else(|| BookingError::validation("showing_id", "no showing selected"))?;
        if self.selected.is_empty() {
            return Err(BookingError::validation("seats", "no seats selected"));
        }

        let mut report = CheckoutReport::default();
        let seats: Vec<Seat> = self.selected.iter().copied().collect();
        for seat in seats {
            let request = ReserveRequest {
                showing_id,
                row: seat.row.to_string(),
                column: i64::from(seat.column),
                email: email.to_string(),
            };
            match manager.reserve(request).await {
                Ok(ticket) => {
                    self.selected.remove(&seat);
                    self.tickets.push(ticket.clone());
                    report.reserved.push(ticket);
                }
                Err(BookingError::SeatConflict { seat, .. }) => {
                    self.selected.remove(&seat);
                    report.conflicts.push(seat);
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            showing_id,
            reserved = report.reserved.len(),
            conflicts = report.conflicts.len(),
            "Checkout finished"
        );
        Ok(report)
    }

    /// Pay every ticket the session holds. Already-paid tickets are fine.
    pub async fn pay_all(&mut self, manager: &TicketLifecycleManager) -> Result<&[Ticket]> {
        for ticket in self.tickets.iter_mut() {
            *ticket = manager.pay(ticket.id).await?.ticket;
        }
        Ok(&self.tickets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewShowing, TicketStatus};
    use crate::metrics::Metrics;
    use crate::store::{CatalogStore, MemoryStore};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    async fn setup() -> (TicketLifecycleManager, Showing) {
        let store = Arc::new(MemoryStore::new());
        let showing = store
            .insert_showing(NewShowing {
                movie_id: 4,
                starts_at: Utc.with_ymd_and_hms(2026, 11, 2, 20, 0, 0).unwrap(),
                room: "Room 1".to_string(),
                rows: 2,
                columns: 3,
            })
            .await
            .unwrap();
        (TicketLifecycleManager::new(store, Metrics::new().unwrap()), showing)
    }

    #[tokio::test]
    async fn changing_movie_resets_selection() {
        let (_, showing) = setup().await;
        let mut session = BookingSession::new();
        session.select_movie(4);
        session.select_showing(showing).unwrap();
        assert!(session.toggle_seat("a", 1).unwrap());
        assert!(!session.toggle_seat("A", 1).unwrap());
        assert!(session.toggle_seat("B", 3).unwrap());

        session.select_movie(5);
        assert!(session.showing().is_none());
        assert_eq!(session.selected_seats().count(), 0);
    }

    #[tokio::test]
    async fn showing_must_match_movie() {
        let (_, showing) = setup().await;
        let mut session = BookingSession::new();
        session.select_movie(1);
        assert!(session.select_showing(showing).is_err());
        assert!(session.toggle_seat("A", 1).is_err());
    }

    #[tokio::test]
    async fn checkout_reports_conflicts_and_pays() {
        let (manager, showing) = setup().await;

        // Another guest takes A2 first.
        manager
            .reserve(ReserveRequest {
                showing_id: showing.id,
                row: "A".to_string(),
                column: 2,
                email: "other@y.com".to_string(),
            })
            .await
            .unwrap();

        let mut session = BookingSession::new();
        session.select_showing(showing).unwrap();
        session.toggle_seat("A", 1).unwrap();
        session.toggle_seat("A", 2).unwrap();

        let report = session.checkout(&manager, "x@y.com").await.unwrap();
        assert_eq!(report.reserved.len(), 1);
        assert_eq!(report.reserved[0].seat, Seat::new('A', 1));
        assert_eq!(report.conflicts, vec![Seat::new('A', 2)]);
        assert_eq!(session.selected_seats().count(), 0);

        let tickets = session.pay_all(&manager).await.unwrap();
        assert!(tickets.iter().all(|t| t.status == TicketStatus::Paid));
        // Paying again is a no-op.
        session.pay_all(&manager).await.unwrap();
    }

    #[tokio::test]
    async fn checkout_needs_a_selection() {
        let (manager, showing) = setup().await;
        let mut session = BookingSession::new();
        assert!(session.checkout(&manager, "x@y.com").await.is_err());
        session.select_showing(showing).unwrap();
        assert!(matches!(
            session.checkout(&manager, "x@y.com").await,
            Err(BookingError::Validation { field: "seats", .. })
        ));
    }
}
