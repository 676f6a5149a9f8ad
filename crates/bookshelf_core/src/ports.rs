//! crates/bookshelf_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::CatalogVolume;
use crate::domain::{
    Book, BookDraft, BookUpdate, NewShelfItem, ShelfEntry, ShelfItem, ShelfItemUpdate, User,
    UserCredentials, UserUpdate,
};
use crate::rating::Rating;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Upstream service failure: {0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, name: &str, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> PortResult<User>;

    /// Removes the user with its shelf and sessions, taking its ratings out
    /// of every affected book aggregate.
    async fn delete_user(&self, user_id: Uuid) -> PortResult<()>;

    // --- Auth Methods ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owner of an unexpired session.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Book Management ---
    async fn get_book_by_id(&self, book_id: Uuid) -> PortResult<Book>;

    async fn find_book_by_isbn(&self, isbn: &str) -> PortResult<Option<Book>>;

    /// Inserts a book, failing with `Conflict` if any of its ISBNs is
    /// already used by another book.
    async fn create_book(&self, draft: BookDraft, created_by: Uuid) -> PortResult<Book>;

    /// Applies a partial update. New ISBNs colliding with a different book
    /// fail with `Conflict`.
    async fn update_book(&self, book_id: Uuid, update: BookUpdate) -> PortResult<Book>;

    async fn delete_book(&self, book_id: Uuid) -> PortResult<()>;

    // --- Shelf Management ---
    async fn list_shelf(&self, user_id: Uuid) -> PortResult<Vec<ShelfEntry>>;

    async fn get_shelf_item(&self, item_id: Uuid) -> PortResult<ShelfItem>;

    /// Fails with `NotFound` if the book is missing and `InvalidArgument` if
    /// the book is already on the user's shelf.
    async fn add_to_shelf(&self, user_id: Uuid, item: NewShelfItem) -> PortResult<ShelfItem>;

    async fn update_shelf_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        update: ShelfItemUpdate,
    ) -> PortResult<ShelfItem>;

    /// Sets or clears a rating and adjusts the book aggregate in the same
    /// transaction.
    async fn set_shelf_item_rating(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        rating: Option<Rating>,
    ) -> PortResult<ShelfItem>;

    async fn remove_shelf_item(&self, user_id: Uuid, item_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Looks up the first catalog volume matching a normalized ISBN.
    async fn lookup_isbn(&self, isbn: &str) -> PortResult<Option<CatalogVolume>>;
}
