use crate::domain::{Movie, NewMovie, NewShowing, Showing, ShowingSummary};
use crate::metrics::Metrics;
use crate::store::Storage;
use crate::{BookingError, Result};
use std::sync::Arc;
use tracing::info;

/// Movies and showings: the reference data tickets are booked against.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Storage>,
    metrics: Metrics,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Storage>, metrics: Metrics) -> Self {
        Self { store, metrics }
    }

    pub async fn create_movie(&self, movie: NewMovie) -> Result<Movie> {
        let movie = self.store.insert_movie(movie.validate()?).await?;
        self.metrics.movies_created.inc();
        info!(movie_id = movie.id, title = %movie.title, "Movie created");
        Ok(movie)
    }

    pub async fn get_movie(&self, id: u64) -> Result<Movie> {
        self.store
            .get_movie(id)
            .await?
            .ok_or_else(|| BookingError::not_found("movie", id))
    }

    pub async fn list_movies(&self) -> Result<Vec<Movie>> {
        self.store.list_movies().await
    }

    pub async fn create_showing(&self, showing: NewShowing) -> Result<Showing> {
        let showing = showing.validate()?;
        if self.store.get_movie(showing.movie_id).await?.is_none() {
            return Err(BookingError::validation(
                "movie_id",
                format!("movie {} does not exist", showing.movie_id),
            ));
        }

        let showing = self.store.insert_showing(showing).await?;
        self.metrics.showings_created.inc();
        info!(
            showing_id = showing.id,
            movie_id = showing.movie_id,
            room = %showing.room,
            starts_at = %showing.starts_at,
            "Showing created"
        );
        Ok(showing)
    }

    pub async fn get_showing(&self, id: u64) -> Result<ShowingSummary> {
        let showing = self
            .store
            .get_showing(id)
            .await?
            .ok_or_else(|| BookingError::not_found("showing", id))?;
        self.summarize(showing).await
    }

    pub async fn list_showings(&self) -> Result<Vec<ShowingSummary>> {
        let mut summaries = Vec::new();
        for showing in self.store.list_showings().await? {
            summaries.push(self.summarize(showing).await?);
        }
        Ok(summaries)
    }

    pub async fn list_showings_for_movie(&self, movie_id: u64) -> Result<Vec<ShowingSummary>> {
        self.get_movie(movie_id).await?;
        let mut summaries = Vec::new();
        for showing in self.store.list_showings().await? {
            if showing.movie_id == movie_id {
                summaries.push(self.summarize(showing).await?);
            }
        }
        Ok(summaries)
    }

    async fn summarize(&self, showing: Showing) -> Result<ShowingSummary> {
        let tickets = self.store.tickets_for_showing(showing.id).await?;
        Ok(ShowingSummary::new(showing, &tickets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgeRating;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn catalog() -> CatalogService {
        CatalogService::new(Arc::new(MemoryStore::new()), Metrics::new().unwrap())
    }

    fn movie(title: &str) -> NewMovie {
        NewMovie {
            title: title.to_string(),
            synopsis: "demo".to_string(),
            runtime_min: 100,
            rating: Some(AgeRating::AllAudiences),
            poster_url: None,
        }
    }

    fn showing(movie_id: u64, hours: i64) -> NewShowing {
        NewShowing {
            movie_id,
            starts_at: Utc.with_ymd_and_hms(2026, 11, 2, 18, 0, 0).unwrap() + Duration::hours(hours),
            room: "Room 1".to_string(),
            rows: 3,
            columns: 4,
        }
    }

    #[tokio::test]
    async fn movies_are_listed_by_title() {
        let catalog = catalog();
        catalog.create_movie(movie("BBBB")).await.unwrap();
        catalog.create_movie(movie("AAAA")).await.unwrap();

        let titles: Vec<String> = catalog
            .list_movies()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        assert_eq!(titles, vec!["AAAA", "BBBB"]);
    }

    #[tokio::test]
    async fn showing_requires_existing_movie() {
        let catalog = catalog();
        let err = catalog.create_showing(showing(3, 0)).await.unwrap_err();
        assert!(matches!(err, BookingError::Validation { field: "movie_id", .. }));
    }

    #[tokio::test]
    async fn showings_carry_seat_counts() {
        let catalog = catalog();
        let movie = catalog.create_movie(movie("Prueba")).await.unwrap();
        let late = catalog.create_showing(showing(movie.id, 3)).await.unwrap();
        let early = catalog.create_showing(showing(movie.id, 0)).await.unwrap();

        let summary = catalog.get_showing(late.id).await.unwrap();
        assert_eq!(summary.total_seats, 12);
        assert_eq!(summary.available_seats, 12);

        let ids: Vec<u64> = catalog
            .list_showings_for_movie(movie.id)
            .await
            .unwrap()
            .iter()
            .map(|s| s.showing.id)
            .collect();
        assert_eq!(ids, vec![early.id, late.id]);

        assert!(matches!(
            catalog.list_showings_for_movie(99).await,
            Err(BookingError::NotFound { entity: "movie", .. })
        ));
    }

    #[tokio::test]
    async fn room_cannot_host_two_showings_at_once() {
        let catalog = catalog();
        let movie = catalog.create_movie(movie("Prueba")).await.unwrap();
        catalog.create_showing(showing(movie.id, 0)).await.unwrap();
        assert!(matches!(
            catalog.create_showing(showing(movie.id, 0)).await,
            Err(BookingError::ShowingConflict { .. })
        ));
    }
}
