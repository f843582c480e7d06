use super::keys::{
    id_from_key, movie_key, seat_key, showing_key, showing_seats_prefix, slot_key, ticket_key,
    MOVIE_PREFIX, SHOWING_PREFIX, TICKET_PREFIX,
};
use super::locks::KeyLocks;
use super::{paid_seat_locked, CatalogStore, PaymentOutcome, Storage, TicketStore};
use crate::domain::{Movie, NewMovie, NewShowing, NewTicket, Seat, Showing, Ticket};
use crate::{BookingError, Result};
use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// RocksDB-backed storage.
///
/// Values are JSON. Writes that touch several keys go through a `WriteBatch`
/// so they land atomically; claims on seats and room slots hold a key lock
/// across the read-check-write and never wait for it.
pub struct RocksDBStore {
    db: DB,
    locks: KeyLocks,
    lock_timeout: Duration,
    next_movie_id: AtomicU64,
    next_showing_id: AtomicU64,
    next_ticket_id: AtomicU64,
}

impl RocksDBStore {
    pub fn open<P: AsRef<Path>>(path: P, lock_timeout: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_open_files(10000);
        opts.set_use_fsync(false);
        opts.set_bytes_per_sync(8388608);
        opts.optimize_for_point_lookup(1024);
        opts.set_table_cache_num_shard_bits(6);
        opts.set_compaction_style(rocksdb::DBCompactionStyle::Universal);

        let db = DB::open(&opts, path)?;

        let store = Self {
            next_movie_id: AtomicU64::new(max_id(&db, MOVIE_PREFIX)?),
            next_showing_id: AtomicU64::new(max_id(&db, SHOWING_PREFIX)?),
            next_ticket_id: AtomicU64::new(max_id(&db, TICKET_PREFIX)?),
            db,
            locks: KeyLocks::new(),
            lock_timeout,
        };
        debug!(
            movies = store.next_movie_id.load(Ordering::SeqCst),
            showings = store.next_showing_id.load(Ordering::SeqCst),
            tickets = store.next_ticket_id.load(Ordering::SeqCst),
            "Id counters restored"
        );
        Ok(store)
    }

    fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self.db.get(key)? {
            Some(value) => {
                let deserialized: T = serde_json::from_slice(&value)?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    fn put<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        let serialized = serde_json::to_vec(value)?;
        self.db.put(key, serialized)?;
        Ok(())
    }

    fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.db.get(key)?.is_some())
    }

    fn scan<T>(&self, prefix: &str) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut values = Vec::new();
        for item in self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    async fn lock_ticket(&self, id: u64) -> Result<super::locks::KeyGuard> {
        self.locks
            .lock(&ticket_key(id), self.lock_timeout)
            .await
            .ok_or(BookingError::Busy {
                entity: "ticket",
                id,
            })
    }
}

fn max_id(db: &DB, prefix: &str) -> Result<u64> {
    let mut max = 0;
    for item in db.iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward)) {
        let (key, _) = item?;
        if !key.starts_with(prefix.as_bytes()) {
            break;
        }
        if let Some(id) = id_from_key(prefix, &key) {
            max = max.max(id);
        }
    }
    Ok(max)
}

fn next_id(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

#[async_trait]
impl CatalogStore for RocksDBStore {
    async fn insert_movie(&self, movie: NewMovie) -> Result<Movie> {
        let movie = movie.into_movie(next_id(&self.next_movie_id));
        self.put(&movie_key(movie.id), &movie)?;
        Ok(movie)
    }

    async fn get_movie(&self, id: u64) -> Result<Option<Movie>> {
        self.get(&movie_key(id))
    }

    async fn list_movies(&self) -> Result<Vec<Movie>> {
        let mut movies: Vec<Movie> = self.scan(MOVIE_PREFIX)?;
        movies.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(movies)
    }

    async fn insert_showing(&self, showing: NewShowing) -> Result<Showing> {
        let slot = slot_key(&showing.starts_at, &showing.room);
        let conflict = || BookingError::ShowingConflict {
            room: showing.room.clone(),
            starts_at: showing.starts_at.to_rfc3339(),
        };

        let _guard = self.locks.try_lock(&slot).ok_or_else(conflict)?;
        if self.contains_key(&slot)? {
            return Err(conflict());
        }

        let showing = showing.into_showing(next_id(&self.next_showing_id));
        let mut batch = WriteBatch::default();
        batch.put(showing_key(showing.id), serde_json::to_vec(&showing)?);
        batch.put(&slot, showing.id.to_string());
        self.db.write(batch)?;
        Ok(showing)
    }

    async fn get_showing(&self, id: u64) -> Result<Option<Showing>> {
        self.get(&showing_key(id))
    }

    async fn list_showings(&self) -> Result<Vec<Showing>> {
        let mut showings: Vec<Showing> = self.scan(SHOWING_PREFIX)?;
        showings.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        Ok(showings)
    }
}

#[async_trait]
impl TicketStore for RocksDBStore {
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket> {
        let seat = seat_key(ticket.showing_id, ticket.seat);
        let conflict = BookingError::SeatConflict {
            showing_id: ticket.showing_id,
            seat: ticket.seat,
        };

        let Some(_guard) = self.locks.try_lock(&seat) else {
            return Err(conflict);
        };
        if self.contains_key(&seat)? {
            return Err(conflict);
        }

        let ticket = ticket.into_ticket(next_id(&self.next_ticket_id));
        let mut batch = WriteBatch::default();
        batch.put(ticket_key(ticket.id), serde_json::to_vec(&ticket)?);
        batch.put(&seat, ticket.id.to_string());
        self.db.write(batch)?;
        Ok(ticket)
    }

    async fn get_ticket(&self, id: u64) -> Result<Option<Ticket>> {
        self.get(&ticket_key(id))
    }

    async fn mark_paid(&self, id: u64) -> Result<Option<PaymentOutcome>> {
        let _guard = self.lock_ticket(id).await?;
        let Some(mut ticket) = self.get::<Ticket>(&ticket_key(id))? else {
            return Ok(None);
        };

        let transitioned = ticket.mark_paid();
        if transitioned {
            self.put(&ticket_key(id), &ticket)?;
        }
        Ok(Some(PaymentOutcome {
            ticket,
            transitioned,
        }))
    }

    async fn move_seat(&self, id: u64, seat: Seat) -> Result<Option<Ticket>> {
        let _ticket_guard = self.lock_ticket(id).await?;
        let Some(mut ticket) = self.get::<Ticket>(&ticket_key(id))? else {
            return Ok(None);
        };
        if ticket.seat == seat {
            return Ok(Some(ticket));
        }
        if ticket.is_paid() {
            return Err(paid_seat_locked(&ticket));
        }

        let new_seat = seat_key(ticket.showing_id, seat);
        let conflict = BookingError::SeatConflict {
            showing_id: ticket.showing_id,
            seat,
        };
        let Some(_seat_guard) = self.locks.try_lock(&new_seat) else {
            return Err(conflict);
        };
        if self.contains_key(&new_seat)? {
            return Err(conflict);
        }

        let old_seat = seat_key(ticket.showing_id, ticket.seat);
        ticket.seat = seat;
        let mut batch = WriteBatch::default();
        batch.put(ticket_key(id), serde_json::to_vec(&ticket)?);
        batch.put(&new_seat, id.to_string());
        batch.delete(&old_seat);
        self.db.write(batch)?;
        Ok(Some(ticket))
    }

    async fn update_email(&self, id: u64, email: String) -> Result<Option<Ticket>> {
        let _guard = self.lock_ticket(id).await?;
        let Some(mut ticket) = self.get::<Ticket>(&ticket_key(id))? else {
            return Ok(None);
        };
        ticket.email = email;
        self.put(&ticket_key(id), &ticket)?;
        Ok(Some(ticket))
    }

    async fn tickets_for_showing(&self, showing_id: u64) -> Result<Vec<Ticket>> {
        // Seat index and ticket bodies are read from one snapshot so a concurrent
        // move cannot show up half applied.
        let snapshot = self.db.snapshot();
        let prefix = showing_seats_prefix(showing_id);
        let mut ids = Vec::new();
        for item in snapshot.iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward)) {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            if let Some(id) = std::str::from_utf8(&value).ok().and_then(|v| v.parse().ok()) {
                ids.push(id);
            }
        }

        let mut tickets = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(value) = snapshot.get(ticket_key(id))? {
                tickets.push(serde_json::from_slice::<Ticket>(&value)?);
            }
        }
        tickets.sort_by_key(|t| t.id);
        Ok(tickets)
    }

    async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self.scan(TICKET_PREFIX)?;
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tickets)
    }
}

impl Storage for RocksDBStore {
    fn backend(&self) -> &'static str {
        "rocksdb"
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Drop for RocksDBStore {
    fn drop(&mut self) {
        let _ = self.db.flush();
    }
}
