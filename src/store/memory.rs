use super::keys::slot_key;
use super::{paid_seat_locked, CatalogStore, PaymentOutcome, Storage, TicketStore};
use crate::domain::{Movie, NewMovie, NewShowing, NewTicket, Seat, Showing, Ticket};
use crate::{BookingError, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory backend. Uniqueness is enforced through `DashMap`'s entry API,
/// which holds the shard lock between the occupancy check and the insert.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    movies: DashMap<u64, Movie>,
    showings: DashMap<u64, Showing>,
    slots: DashMap<String, u64>,
    tickets: DashMap<u64, Ticket>,
    seats: DashMap<(u64, Seat), u64>,
    next_movie_id: AtomicU64,
    next_showing_id: AtomicU64,
    next_ticket_id: AtomicU64,
}

fn next_id(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket_count(&self) -> usize {
        self.inner.tickets.len()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_movie(&self, movie: NewMovie) -> Result<Movie> {
        let movie = movie.into_movie(next_id(&self.inner.next_movie_id));
        self.inner.movies.insert(movie.id, movie.clone());
        Ok(movie)
    }

    async fn get_movie(&self, id: u64) -> Result<Option<Movie>> {
        Ok(self.inner.movies.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_movies(&self) -> Result<Vec<Movie>> {
        let mut movies: Vec<Movie> = self
            .inner
            .movies
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        movies.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(movies)
    }

    async fn insert_showing(&self, showing: NewShowing) -> Result<Showing> {
        match self.inner.slots.entry(slot_key(&showing.starts_at, &showing.room)) {
            Entry::Occupied(_) => Err(BookingError::ShowingConflict {
                room: showing.room,
                starts_at: showing.starts_at.to_rfc3339(),
            }),
            Entry::Vacant(slot) => {
                let showing = showing.into_showing(next_id(&self.inner.next_showing_id));
                self.inner.showings.insert(showing.id, showing.clone());
                slot.insert(showing.id);
                Ok(showing)
            }
        }
    }

    async fn get_showing(&self, id: u64) -> Result<Option<Showing>> {
        Ok(self.inner.showings.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_showings(&self) -> Result<Vec<Showing>> {
        let mut showings: Vec<Showing> = self
            .inner
            .showings
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        showings.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        Ok(showings)
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket> {
        match self.inner.seats.entry((ticket.showing_id, ticket.seat)) {
            Entry::Occupied(_) => Err(BookingError::SeatConflict {
                showing_id: ticket.showing_id,
                seat: ticket.seat,
            }),
            Entry::Vacant(slot) => {
                let ticket = ticket.into_ticket(next_id(&self.inner.next_ticket_id));
                self.inner.tickets.insert(ticket.id, ticket.clone());
                slot.insert(ticket.id);
                Ok(ticket)
            }
        }
    }

    async fn get_ticket(&self, id: u64) -> Result<Option<Ticket>> {
        Ok(self.inner.tickets.get(&id).map(|entry| entry.value().clone()))
    }

    async fn mark_paid(&self, id: u64) -> Result<Option<PaymentOutcome>> {
        Ok(self.inner.tickets.get_mut(&id).map(|mut entry| {
            let transitioned = entry.mark_paid();
            PaymentOutcome {
                ticket: entry.value().clone(),
                transitioned,
            }
        }))
    }

    async fn move_seat(&self, id: u64, seat: Seat) -> Result<Option<Ticket>> {
        let showing_id = match self.inner.tickets.get(&id) {
            Some(entry) if entry.seat == seat => return Ok(Some(entry.value().clone())),
            Some(entry) if entry.is_paid() => return Err(paid_seat_locked(entry.value())),
            Some(entry) => entry.showing_id,
            None => return Ok(None),
        };

        // Claim the new seat first; the ticket lock is never held while touching `seats`.
        match self.inner.seats.entry((showing_id, seat)) {
            Entry::Occupied(_) => return Err(BookingError::SeatConflict { showing_id, seat }),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let moved = match self.inner.tickets.get_mut(&id) {
            Some(mut entry) if !entry.is_paid() => {
                let previous = entry.seat;
                entry.seat = seat;
                Ok((previous, entry.value().clone()))
            }
            Some(entry) => Err(paid_seat_locked(entry.value())),
            None => Err(BookingError::not_found("ticket", id)),
        };

        match moved {
            Ok((previous, ticket)) => {
                self.inner
                    .seats
                    .remove_if(&(showing_id, previous), |_, owner| *owner == id);
                Ok(Some(ticket))
            }
            Err(e) => {
                self.inner.seats.remove(&(showing_id, seat));
                Err(e)
            }
        }
    }

    async fn update_email(&self, id: u64, email: String) -> Result<Option<Ticket>> {
        Ok(self.inner.tickets.get_mut(&id).map(|mut entry| {
            entry.email = email;
            entry.value().clone()
        }))
    }

    async fn tickets_for_showing(&self, showing_id: u64) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .inner
            .tickets
            .iter()
            .filter(|entry| entry.showing_id == showing_id)
            .map(|entry| entry.value().clone())
            .collect();
        tickets.sort_by_key(|t| t.id);
        Ok(tickets)
    }

    async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .inner
            .tickets
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tickets)
    }
}

impl Storage for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
