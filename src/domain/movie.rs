use crate::{BookingError, Result};
use serde::{Deserialize, Serialize};

const MAX_TITLE_LEN: usize = 200;

/// Standard age classification for screenings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AgeRating {
    #[serde(rename = "TP")]
    AllAudiences,
    #[serde(rename = "+7")]
    Over7,
    #[serde(rename = "+12")]
    Over12,
    #[serde(rename = "+16")]
    Over16,
    #[serde(rename = "+18")]
    Over18,
}

impl AgeRating {
    pub fn description(&self) -> &'static str {
        match self {
            Self::AllAudiences => "All audiences",
            Self::Over7 => "Ages 7 and over",
            Self::Over12 => "Ages 12 and over",
            Self::Over16 => "Ages 16 and over",
            Self::Over18 => "Ages 18 and over",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub synopsis: String,
    pub runtime_min: u16,
    pub rating: Option<AgeRating>,
    pub poster_url: Option<String>,
}

/// Movie as returned to clients, with the readable rating next to its code.
#[derive(Debug, Clone, Serialize)]
pub struct MovieDetails {
    #[serde(flatten)]
    pub movie: Movie,
    pub rating_display: Option<&'static str>,
}

impl From<Movie> for MovieDetails {
    fn from(movie: Movie) -> Self {
        let rating_display = movie.rating.map(|rating| rating.description());
        Self {
            movie,
            rating_display,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMovie {
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    pub runtime_min: u16,
    #[serde(default)]
    pub rating: Option<AgeRating>,
    #[serde(default)]
    pub poster_url: Option<String>,
}

impl NewMovie {
    /// Trim and check the fields, producing the values that get stored.
    pub fn validate(mut self) -> Result<Self> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(BookingError::validation("title", "must not be empty"));
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(BookingError::validation(
                "title",
                format!("must be at most {} characters", MAX_TITLE_LEN),
            ));
        }
        if self.runtime_min < 1 {
            return Err(BookingError::validation("runtime_min", "must be at least 1 minute"));
        }

        self.poster_url = match self.poster_url.take().map(|url| url.trim().to_string()) {
            Some(url) if url.is_empty() => None,
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => Some(url),
            Some(url) => {
                return Err(BookingError::validation(
                    "poster_url",
                    format!("{} is not an http(s) URL", url),
                ))
            }
            None => None,
        };

        Ok(self)
    }

    pub fn into_movie(self, id: u64) -> Movie {
        Movie {
            id,
            title: self.title,
            synopsis: self.synopsis,
            runtime_min: self.runtime_min,
            rating: self.rating,
            poster_url: self.poster_url,
        }
    }
}
