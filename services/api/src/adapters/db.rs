//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Every write that changes a shelf rating also moves the owning book's
//! `app_rating_*` aggregate, inside the same transaction, using relative
//! increments so that concurrent writers on one book never lose an update.

use async_trait::async_trait;
use bookshelf_core::domain::{
    Book, BookDraft, BookUpdate, NewShelfItem, ShelfEntry, ShelfItem, ShelfItemUpdate,
    ShelfStatus, User, UserCredentials, UserUpdate,
};
use bookshelf_core::ports::{DatabaseService, PortError, PortResult};
use bookshelf_core::rating::{Rating, RatingDelta};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const BOOK_COLUMNS: &str = "id, title, subtitle, author, publisher, overview, release_year, \
    pages, cover_url, genres, isbns, rate, ratings_count, language, published_date, \
    google_volume_id, preview_link, info_link, raw, source, created_by, app_rating_sum, \
    app_rating_count, app_rating_avg, created_at, updated_at";

const SHELF_COLUMNS: &str =
    "id, user_id, book_id, status, rating, notes, pages_read, created_at, updated_at";

const USER_COLUMNS: &str = "id, name, email, created_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    name: String,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            name: self.name,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct BookRecord {
    id: Uuid,
    title: String,
    subtitle: Option<String>,
    author: String,
    publisher: String,
    overview: Option<String>,
    release_year: i32,
    pages: i32,
    cover_url: Option<String>,
    genres: Vec<String>,
    isbns: Vec<String>,
    rate: Option<f64>,
    ratings_count: Option<i32>,
    language: Option<String>,
    published_date: Option<String>,
    google_volume_id: Option<String>,
    preview_link: Option<String>,
    info_link: Option<String>,
    raw: Option<serde_json::Value>,
    source: Option<String>,
    created_by: Option<Uuid>,
    app_rating_sum: i64,
    app_rating_count: i32,
    app_rating_avg: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            subtitle: self.subtitle,
            author: self.author,
            publisher: self.publisher,
            overview: self.overview,
            release_year: self.release_year,
            pages: self.pages,
            cover_url: self.cover_url,
            genres: self.genres,
            isbns: self.isbns,
            rate: self.rate,
            ratings_count: self.ratings_count,
            language: self.language,
            published_date: self.published_date,
            google_volume_id: self.google_volume_id,
            preview_link: self.preview_link,
            info_link: self.info_link,
            raw: self.raw,
            source: self.source,
            created_by: self.created_by,
            app_rating_sum: self.app_rating_sum,
            app_rating_count: self.app_rating_count,
            app_rating_avg: self.app_rating_avg,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ShelfItemRecord {
    id: Uuid,
    user_id: Uuid,
    book_id: Uuid,
    status: String,
    rating: Option<i32>,
    notes: Option<String>,
    pages_read: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ShelfItemRecord {
    fn to_domain(self) -> PortResult<ShelfItem> {
        let status = self
            .status
            .parse::<ShelfStatus>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let rating = self
            .rating
            .map(Rating::try_from)
            .transpose()
            .map_err(|e| PortError::Unexpected(format!("stored rating out of range: {}", e)))?;
        Ok(ShelfItem {
            id: self.id,
            user_id: self.user_id,
            book_id: self.book_id,
            status,
            rating,
            notes: self.notes,
            pages_read: self.pages_read,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

//=========================================================================================
// Shared Helpers
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .map_or(false, |code| code == "23505")
}

/// Moves a book's running sum/count by `delta` and recomputes the average
/// from the post-increment values, all in one statement.
async fn apply_rating_delta(
    conn: &mut PgConnection,
    book_id: Uuid,
    delta: RatingDelta,
) -> PortResult<()> {
    if delta.is_noop() {
        return Ok(());
    }
    let count_delta = i32::try_from(delta.count)
        .map_err(|_| PortError::Unexpected(format!("rating count delta {} overflows", delta.count)))?;

    sqlx::query(
        "UPDATE books SET \
            app_rating_sum = app_rating_sum + $1, \
            app_rating_count = app_rating_count + $2, \
            app_rating_avg = CASE WHEN app_rating_count + $2 > 0 \
                THEN (app_rating_sum + $1)::DOUBLE PRECISION / (app_rating_count + $2) \
                ELSE 0 END, \
            updated_at = NOW() \
         WHERE id = $3",
    )
    .bind(delta.sum)
    .bind(count_delta)
    .bind(book_id)
    .execute(&mut *conn)
    .await
    .map_err(unexpected)?;
    Ok(())
}

/// Locks a shelf item owned by `user_id` for the rest of the transaction.
async fn lock_owned_item(
    conn: &mut PgConnection,
    user_id: Uuid,
    item_id: Uuid,
) -> PortResult<ShelfItem> {
    let record = sqlx::query_as::<_, ShelfItemRecord>(&format!(
        "SELECT {SHELF_COLUMNS} FROM shelf_items WHERE id = $1 AND user_id = $2 FOR UPDATE"
    ))
    .bind(item_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(unexpected)?
    .ok_or_else(|| PortError::NotFound(format!("Shelf item {} not found", item_id)))?;
    record.to_domain()
}

/// First book other than `excluding` that uses any of `isbns`.
async fn find_overlapping_book(
    conn: &mut PgConnection,
    isbns: &[String],
    excluding: Option<Uuid>,
) -> PortResult<Option<Book>> {
    let record = sqlx::query_as::<_, BookRecord>(&format!(
        "SELECT {BOOK_COLUMNS} FROM books \
         WHERE isbns && $1 AND ($2::UUID IS NULL OR id <> $2) LIMIT 1"
    ))
    .bind(isbns)
    .bind(excluding)
    .fetch_optional(&mut *conn)
    .await
    .map_err(unexpected)?;
    Ok(record.map(BookRecord::to_domain))
}

/// Serializes ISBN check-then-write sequences against each other. Plain reads
/// are not blocked.
async fn lock_books_for_isbn_change(conn: &mut PgConnection) -> PortResult<()> {
    sqlx::query("LOCK TABLE books IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *conn)
        .await
        .map_err(unexpected)?;
    Ok(())
}

fn push_set<'a, T>(qb: &mut QueryBuilder<'a, Postgres>, column: &str, value: Option<T>)
where
    T: 'a + sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send,
{
    if let Some(value) = value {
        qb.push(", ").push(column).push(" = ").push_bind(value);
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, name, email, hashed_password) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict("Email already registered".to_string())
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, name, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> PortResult<User> {
        if update.is_empty() {
            return self.get_user_by_id(user_id).await;
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET id = id");
        push_set(&mut qb, "name", update.name);
        push_set(&mut qb, "email", update.email);
        push_set(&mut qb, "hashed_password", update.hashed_password);
        qb.push(" WHERE id = ")
            .push_bind(user_id)
            .push(" RETURNING ")
            .push(USER_COLUMNS);

        let record = qb
            .build_query_as::<UserRecord>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PortError::Conflict("Email already registered".to_string())
                } else {
                    unexpected(e)
                }
            })?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Book rows are touched in book_id order so concurrent deletions
        // sharing books cannot lock them in opposite orders.
        let rated: Vec<(Uuid, i32)> = sqlx::query_as(
            "SELECT book_id, rating FROM shelf_items \
             WHERE user_id = $1 AND rating IS NOT NULL \
             ORDER BY book_id FOR UPDATE",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(unexpected)?;

        for (book_id, rating) in rated {
            let old = Rating::try_from(rating)?;
            apply_rating_delta(&mut tx, book_id, RatingDelta::between(Some(old), None)).await?;
        }

        // Shelf items and auth sessions go with the user (ON DELETE CASCADE).
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if deleted.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }

        tx.commit().await.map_err(unexpected)?;
        info!("Deleted user {}", user_id);
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT s.user_id FROM auth_sessions s JOIN users u ON u.id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_book_by_id(&self, book_id: Uuid) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"
        ))
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Book {} not found", book_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> PortResult<Option<Book>> {
        let record = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE $1 = ANY(isbns) LIMIT 1"
        ))
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(BookRecord::to_domain))
    }

    async fn create_book(&self, draft: BookDraft, created_by: Uuid) -> PortResult<Book> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        lock_books_for_isbn_change(&mut tx).await?;

        if let Some(existing) = find_overlapping_book(&mut tx, &draft.isbns, None).await? {
            return Err(PortError::Conflict(format!(
                "Book already registered as {}",
                existing.id
            )));
        }

        let record = sqlx::query_as::<_, BookRecord>(&format!(
            "INSERT INTO books (id, title, subtitle, author, publisher, overview, release_year, \
                pages, cover_url, genres, isbns, rate, ratings_count, language, published_date, \
                google_volume_id, preview_link, info_link, raw, source, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                $17, $18, $19, $20, $21) \
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(draft.title)
        .bind(draft.subtitle)
        .bind(draft.author)
        .bind(draft.publisher)
        .bind(draft.overview)
        .bind(draft.release_year)
        .bind(draft.pages)
        .bind(draft.cover_url)
        .bind(draft.genres)
        .bind(draft.isbns)
        .bind(draft.rate)
        .bind(draft.ratings_count)
        .bind(draft.language)
        .bind(draft.published_date)
        .bind(draft.google_volume_id)
        .bind(draft.preview_link)
        .bind(draft.info_link)
        .bind(draft.raw)
        .bind(draft.source)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_book(&self, book_id: Uuid, update: BookUpdate) -> PortResult<Book> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        if let Some(isbns) = &update.isbns {
            lock_books_for_isbn_change(&mut tx).await?;
            if let Some(conflict) = find_overlapping_book(&mut tx, isbns, Some(book_id)).await? {
                return Err(PortError::Conflict(format!(
                    "Another book ({}) already uses one of these ISBNs",
                    conflict.id
                )));
            }
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE books SET updated_at = NOW()");
        push_set(&mut qb, "title", update.title);
        push_set(&mut qb, "subtitle", update.subtitle);
        push_set(&mut qb, "author", update.author);
        push_set(&mut qb, "publisher", update.publisher);
        push_set(&mut qb, "overview", update.overview);
        push_set(&mut qb, "release_year", update.release_year);
        push_set(&mut qb, "pages", update.pages);
        push_set(&mut qb, "cover_url", update.cover_url);
        push_set(&mut qb, "genres", update.genres);
        push_set(&mut qb, "isbns", update.isbns);
        push_set(&mut qb, "rate", update.rate);
        push_set(&mut qb, "ratings_count", update.ratings_count);
        push_set(&mut qb, "language", update.language);
        push_set(&mut qb, "published_date", update.published_date);
        push_set(&mut qb, "preview_link", update.preview_link);
        push_set(&mut qb, "info_link", update.info_link);
        push_set(&mut qb, "raw", update.raw);
        push_set(&mut qb, "source", update.source);
        qb.push(" WHERE id = ")
            .push_bind(book_id)
            .push(" RETURNING ")
            .push(BOOK_COLUMNS);

        let record = qb
            .build_query_as::<BookRecord>()
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn delete_book(&self, book_id: Uuid) -> PortResult<()> {
        let deleted = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if deleted.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Book {} not found", book_id)));
        }
        Ok(())
    }

    async fn list_shelf(&self, user_id: Uuid) -> PortResult<Vec<ShelfEntry>> {
        let items = sqlx::query_as::<_, ShelfItemRecord>(&format!(
            "SELECT {SHELF_COLUMNS} FROM shelf_items WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let book_ids: Vec<Uuid> = items.iter().map(|item| item.book_id).collect();
        let mut books: HashMap<Uuid, Book> = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = ANY($1)"
        ))
        .bind(&book_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(|record| (record.id, record.to_domain()))
        .collect();

        items
            .into_iter()
            .map(|record| {
                let item = record.to_domain()?;
                let book = books.remove(&item.book_id).ok_or_else(|| {
                    PortError::Unexpected(format!("Book {} missing for shelf item {}", item.book_id, item.id))
                })?;
                Ok(ShelfEntry { item, book })
            })
            .collect()
    }

    async fn get_shelf_item(&self, item_id: Uuid) -> PortResult<ShelfItem> {
        let record = sqlx::query_as::<_, ShelfItemRecord>(&format!(
            "SELECT {SHELF_COLUMNS} FROM shelf_items WHERE id = $1"
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Shelf item {} not found", item_id)))?;
        record.to_domain()
    }

    async fn add_to_shelf(&self, user_id: Uuid, item: NewShelfItem) -> PortResult<ShelfItem> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let book_exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM books WHERE id = $1")
            .bind(item.book_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?;
        if book_exists.is_none() {
            return Err(PortError::NotFound(format!("Book {} not found", item.book_id)));
        }

        let record = sqlx::query_as::<_, ShelfItemRecord>(&format!(
            "INSERT INTO shelf_items (id, user_id, book_id, status, rating, notes) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {SHELF_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(item.book_id)
        .bind(item.status.as_str())
        .bind(item.rating.map(i32::from))
        .bind(item.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::InvalidArgument("Book already in the shelf".to_string())
            } else {
                unexpected(e)
            }
        })?;

        apply_rating_delta(&mut tx, item.book_id, RatingDelta::between(None, item.rating)).await?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn update_shelf_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        update: ShelfItemUpdate,
    ) -> PortResult<ShelfItem> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let current = lock_owned_item(&mut tx, user_id, item_id).await?;

        let delta = match update.rating {
            Some(next) => RatingDelta::between(current.rating, next),
            None => RatingDelta::default(),
        };

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE shelf_items SET updated_at = NOW()");
        push_set(&mut qb, "status", update.status.map(|s| s.as_str()));
        push_set(&mut qb, "rating", update.rating.map(|r| r.map(i32::from)));
        push_set(&mut qb, "notes", update.notes);
        push_set(&mut qb, "pages_read", update.pages_read);
        qb.push(" WHERE id = ")
            .push_bind(item_id)
            .push(" RETURNING ")
            .push(SHELF_COLUMNS);

        let record = qb
            .build_query_as::<ShelfItemRecord>()
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;

        apply_rating_delta(&mut tx, current.book_id, delta).await?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn set_shelf_item_rating(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        rating: Option<Rating>,
    ) -> PortResult<ShelfItem> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // 1. Scoped lookup, row stays locked until commit.
        let current = lock_owned_item(&mut tx, user_id, item_id).await?;

        // 2. Delta from the previous rating.
        let delta = RatingDelta::between(current.rating, rating);

        // 3. New rating on the shelf item.
        let record = sqlx::query_as::<_, ShelfItemRecord>(&format!(
            "UPDATE shelf_items SET rating = $1, updated_at = NOW() WHERE id = $2 \
             RETURNING {SHELF_COLUMNS}"
        ))
        .bind(rating.map(i32::from))
        .bind(item_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        // 4. Book aggregate, skipped when nothing changed.
        apply_rating_delta(&mut tx, current.book_id, delta).await?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn remove_shelf_item(&self, user_id: Uuid, item_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let current = lock_owned_item(&mut tx, user_id, item_id).await?;

        sqlx::query("DELETE FROM shelf_items WHERE id = $1")
            .bind(item_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        apply_rating_delta(
            &mut tx,
            current.book_id,
            RatingDelta::between(current.rating, None),
        )
        .await?;

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }
}
