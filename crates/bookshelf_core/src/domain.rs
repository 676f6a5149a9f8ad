//! crates/bookshelf_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::rating::{display_rating, Rating, RatingAggregate};

/// A book persisted in the catalogue, shared by every user's shelf.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub author: String,
    pub publisher: String,
    pub overview: Option<String>,
    pub release_year: i32,
    pub pages: i32,
    pub cover_url: Option<String>,
    pub genres: Vec<String>,
    /// Normalized ISBN-10/ISBN-13 values. No two books share a value.
    pub isbns: Vec<String>,
    /// Rating reported by the external catalog, if any.
    pub rate: Option<f64>,
    pub ratings_count: Option<i32>,
    pub language: Option<String>,
    pub published_date: Option<String>,
    pub google_volume_id: Option<String>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
    pub raw: Option<serde_json::Value>,
    pub source: Option<String>,
    pub created_by: Option<Uuid>,
    pub app_rating_sum: i64,
    pub app_rating_count: i32,
    pub app_rating_avg: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// The in-app rating aggregate carried on this record.
    pub fn aggregate(&self) -> RatingAggregate {
        RatingAggregate {
            sum: self.app_rating_sum,
            count: i64::from(self.app_rating_count),
        }
    }

    /// The single rating shown to end users.
    pub fn display_rating(&self) -> Option<f64> {
        display_rating(self.rate, &self.aggregate())
    }
}

/// Everything needed to insert a new book. Aggregates always start at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct BookDraft {
    pub title: String,
    pub subtitle: Option<String>,
    pub author: String,
    pub publisher: String,
    pub overview: Option<String>,
    pub release_year: i32,
    pub pages: i32,
    pub cover_url: Option<String>,
    pub genres: Vec<String>,
    pub isbns: Vec<String>,
    pub rate: Option<f64>,
    pub ratings_count: Option<i32>,
    pub language: Option<String>,
    pub published_date: Option<String>,
    pub google_volume_id: Option<String>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
    pub raw: Option<serde_json::Value>,
    pub source: Option<String>,
}

/// A partial update of a book. `None` leaves a field untouched; for nullable
/// columns `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub subtitle: Option<Option<String>>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub overview: Option<Option<String>>,
    pub release_year: Option<i32>,
    pub pages: Option<i32>,
    pub cover_url: Option<Option<String>>,
    pub genres: Option<Vec<String>>,
    pub isbns: Option<Vec<String>>,
    pub rate: Option<Option<f64>>,
    pub ratings_count: Option<Option<i32>>,
    pub language: Option<Option<String>>,
    pub published_date: Option<Option<String>>,
    pub preview_link: Option<Option<String>>,
    pub info_link: Option<Option<String>>,
    pub raw: Option<Option<serde_json::Value>>,
    pub source: Option<Option<String>>,
}

impl BookUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub hashed_password: String,
}

/// Self-service account changes. The password is already hashed.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub hashed_password: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.hashed_password.is_none()
    }
}

// Represents a login session (bearer token / auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Reading status of a shelf item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ShelfStatus {
    #[default]
    Planned,
    Reading,
    Read,
    Dropped,
}

impl ShelfStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShelfStatus::Planned => "PLANNED",
            ShelfStatus::Reading => "READING",
            ShelfStatus::Read => "READ",
            ShelfStatus::Dropped => "DROPPED",
        }
    }
}

impl fmt::Display for ShelfStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Status must be one of PLANNED, READING, READ, DROPPED (got '{0}')")]
pub struct UnknownStatus(pub String);

impl FromStr for ShelfStatus {
    type Err = UnknownStatus;

    /// Case-insensitive, so `"reading"` and `"READING"` are the same status.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PLANNED" => Ok(ShelfStatus::Planned),
            "READING" => Ok(ShelfStatus::Reading),
            "READ" => Ok(ShelfStatus::Read),
            "DROPPED" => Ok(ShelfStatus::Dropped),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A user's personal tracking record for one book.
#[derive(Debug, Clone, PartialEq)]
pub struct ShelfItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub status: ShelfStatus,
    pub rating: Option<Rating>,
    pub notes: Option<String>,
    pub pages_read: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A shelf item joined with the book it tracks.
#[derive(Debug, Clone)]
pub struct ShelfEntry {
    pub item: ShelfItem,
    pub book: Book,
}

#[derive(Debug, Clone)]
pub struct NewShelfItem {
    pub book_id: Uuid,
    pub status: ShelfStatus,
    pub rating: Option<Rating>,
    pub notes: Option<String>,
}

/// General shelf item changes. `rating: Some(None)` clears the rating.
#[derive(Debug, Clone, Default)]
pub struct ShelfItemUpdate {
    pub status: Option<ShelfStatus>,
    pub rating: Option<Option<Rating>>,
    pub notes: Option<Option<String>>,
    pub pages_read: Option<Option<i32>>,
}
