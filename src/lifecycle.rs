//! Ticket lifecycle: reserve, pay, seat changes and the seat-map read path.
//!
//! Input is validated against the showing's grid before anything reaches
//! storage. Seat uniqueness is never re-derived from the seat map: the manager
//! issues the atomic insert and interprets a collision as `SeatConflict`.

use crate::domain::{
    validate_email, NewTicket, Seat, SeatMap, SeatMapMode, Showing, Ticket, TicketChanges,
};
use crate::metrics::Metrics;
use crate::store::Storage;
use crate::{BookingError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Raw create-ticket input as received from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub showing_id: u64,
    pub row: String,
    pub column: i64,
    pub email: String,
}

/// Outcome of a pay call; `transitioned` is false for repeated confirmations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub ticket: Ticket,
    pub transitioned: bool,
}

#[derive(Clone)]
pub struct TicketLifecycleManager {
    store: Arc<dyn Storage>,
    metrics: Metrics,
}

impl TicketLifecycleManager {
    pub fn new(store: Arc<dyn Storage>, metrics: Metrics) -> Self {
        Self { store, metrics }
    }

    pub async fn reserve(&self, request: ReserveRequest) -> Result<Ticket> {
        let outcome = self.try_reserve(request).await;
        self.metrics.record_reservation(&outcome);
        outcome
    }

    async fn try_reserve(&self, request: ReserveRequest) -> Result<Ticket> {
        let showing = self.showing_for_input(request.showing_id).await?;
        let email = validate_email(&request.email)?;
        let seat = Seat::parse(&showing, &request.row, request.column)?;

        let new_ticket = NewTicket {
            showing_id: showing.id,
            seat,
            email,
        };
        match self.store.insert_ticket(new_ticket).await {
            Ok(ticket) => {
                info!(
                    ticket_id = ticket.id,
                    showing_id = ticket.showing_id,
                    seat = %ticket.seat,
                    "Seat reserved"
                );
                Ok(ticket)
            }
            Err(e @ BookingError::SeatConflict { .. }) => {
                warn!(showing_id = showing.id, seat = %seat, "Seat already taken");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn pay(&self, ticket_id: u64) -> Result<Payment> {
        let outcome = self
            .store
            .mark_paid(ticket_id)
            .await?
            .ok_or_else(|| BookingError::not_found("ticket", ticket_id))?;

        self.metrics.record_payment(outcome.transitioned);
        if outcome.transitioned {
            info!(ticket_id, seat = %outcome.ticket.seat, "Ticket paid");
        } else {
            info!(ticket_id, "Ticket already paid, confirmation ignored");
        }

        Ok(Payment {
            ticket: outcome.ticket,
            transitioned: outcome.transitioned,
        })
    }

    /// Change the email and, while the ticket is still reserved, its seat.
    pub async fn update(&self, ticket_id: u64, changes: TicketChanges) -> Result<Ticket> {
        let mut ticket = self.get_ticket(ticket_id).await?;

        // Validate everything before the first write so a rejected update changes nothing.
        if let Some(showing_id) = changes.showing_id {
            if showing_id != ticket.showing_id {
                return Err(BookingError::validation(
                    "showing_id",
                    "a ticket cannot be moved to another showing",
                ));
            }
        }
        let email = changes.email.as_deref().map(validate_email).transpose()?;
        let seat = if changes.touches_seat() {
            if ticket.is_paid() {
                return Err(crate::store::paid_seat_locked(&ticket));
            }
            let showing = self.showing_for_input(ticket.showing_id).await?;
            let row = changes.row.unwrap_or_else(|| ticket.seat.row.to_string());
            let column = changes.column.unwrap_or(i64::from(ticket.seat.column));
            Some(Seat::parse(&showing, &row, column)?)
        } else {
            None
        };

        if let Some(seat) = seat {
            ticket = self
                .store
                .move_seat(ticket_id, seat)
                .await?
                .ok_or_else(|| BookingError::not_found("ticket", ticket_id))?;
            info!(ticket_id, seat = %ticket.seat, "Ticket moved");
        }
        if let Some(email) = email {
            ticket = self
                .store
                .update_email(ticket_id, email)
                .await?
                .ok_or_else(|| BookingError::not_found("ticket", ticket_id))?;
        }
        Ok(ticket)
    }

    pub async fn get_ticket(&self, ticket_id: u64) -> Result<Ticket> {
        self.store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| BookingError::not_found("ticket", ticket_id))
    }

    /// Every ticket across all showings, newest first.
    pub async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        self.store.list_tickets().await
    }

    pub async fn seat_map(&self, showing_id: u64, mode: SeatMapMode) -> Result<SeatMap> {
        let showing = self
            .store
            .get_showing(showing_id)
            .await?
            .ok_or_else(|| BookingError::not_found("showing", showing_id))?;
        let tickets = self.store.tickets_for_showing(showing_id).await?;
        Ok(SeatMap::project(&showing, &tickets, mode))
    }

    /// A showing referenced from request input; unknown ids are an input error.
    async fn showing_for_input(&self, showing_id: u64) -> Result<Showing> {
        self.store.get_showing(showing_id).await?.ok_or_else(|| {
            BookingError::validation("showing_id", format!("showing {} does not exist", showing_id))
        })
    }
}
