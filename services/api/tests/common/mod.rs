//! Shared fixtures for the HTTP tests: an in-memory `DatabaseService`, a
//! canned catalog and a helper that serves the real router on a free port.

#![allow(dead_code)]

use api_lib::{
    config::Config,
    web::{self, state::AppState},
};
use async_trait::async_trait;
use bookshelf_core::{
    catalog::{CatalogVolume, IndustryIdentifier},
    domain::{
        Book, BookDraft, BookUpdate, NewShelfItem, ShelfEntry, ShelfItem, ShelfItemUpdate, User,
        UserCredentials, UserUpdate,
    },
    isbn::overlaps,
    ports::{CatalogService, DatabaseService, PortError, PortResult},
    rating::{Rating, RatingAggregate, RatingDelta},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

//=========================================================================================
// In-memory database
//=========================================================================================

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserCredentials>,
    user_created: HashMap<Uuid, DateTime<Utc>>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    books: HashMap<Uuid, Book>,
    shelf: HashMap<Uuid, ShelfItem>,
}

impl Tables {
    fn user(&self, user_id: Uuid) -> PortResult<User> {
        let creds = self
            .users
            .get(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(User {
            id: creds.user_id,
            name: creds.name.clone(),
            email: creds.email.clone(),
            created_at: self.user_created.get(&user_id).copied().unwrap_or_else(Utc::now),
        })
    }

    fn apply_delta(&mut self, book_id: Uuid, delta: RatingDelta) {
        if delta.is_noop() {
            return;
        }
        if let Some(book) = self.books.get_mut(&book_id) {
            let aggregate = book.aggregate().apply(delta);
            book.app_rating_sum = aggregate.sum;
            book.app_rating_count = aggregate.count as i32;
            book.app_rating_avg = aggregate.average();
        }
    }

    fn check_isbns(&self, isbns: &[String], excluding: Option<Uuid>) -> PortResult<()> {
        let taken = self
            .books
            .values()
            .any(|b| Some(b.id) != excluding && overlaps(&b.isbns, isbns));
        if taken {
            return Err(PortError::Conflict(
                "A book with one of these ISBNs already exists".to_string(),
            ));
        }
        Ok(())
    }

    fn owned_item(&mut self, user_id: Uuid, item_id: Uuid) -> PortResult<&mut ShelfItem> {
        self.shelf
            .get_mut(&item_id)
            .filter(|item| item.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("Shelf item {} not found", item_id)))
    }
}

/// `DatabaseService` backed by hash maps behind one mutex, with the same
/// aggregate bookkeeping as the Postgres adapter.
#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
}

impl InMemoryDb {
    pub fn book(&self, book_id: Uuid) -> Option<Book> {
        self.tables.lock().unwrap().books.get(&book_id).cloned()
    }

    /// Recomputes a book's aggregate from the shelf rows.
    pub fn recomputed_aggregate(&self, book_id: Uuid) -> RatingAggregate {
        let tables = self.tables.lock().unwrap();
        tables
            .shelf
            .values()
            .filter(|item| item.book_id == book_id)
            .filter_map(|item| item.rating)
            .fold(RatingAggregate::default(), |acc, rating| {
                acc.apply(RatingDelta::between(None, Some(rating)))
            })
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user(&self, name: &str, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.values().any(|u| u.email == email) {
            return Err(PortError::Conflict("Email already registered".to_string()));
        }
        let id = Uuid::new_v4();
        tables.users.insert(
            id,
            UserCredentials {
                user_id: id,
                name: name.to_string(),
                email: email.to_string(),
                hashed_password: hashed_password.to_string(),
            },
        );
        tables.user_created.insert(id, Utc::now());
        tables.user(id)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let tables = self.tables.lock().unwrap();
        tables
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound("User not found".to_string()))
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.tables.lock().unwrap().user(user_id)
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> PortResult<User> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(email) = &update.email {
            if tables
                .users
                .values()
                .any(|u| &u.email == email && u.user_id != user_id)
            {
                return Err(PortError::Conflict("Email already registered".to_string()));
            }
        }
        let creds = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        if let Some(name) = update.name {
            creds.name = name;
        }
        if let Some(email) = update.email {
            creds.email = email;
        }
        if let Some(hash) = update.hashed_password {
            creds.hashed_password = hash;
        }
        tables.user(user_id)
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.remove(&user_id).is_none() {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        let owned: Vec<ShelfItem> = tables
            .shelf
            .values()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect();
        for item in owned {
            tables.shelf.remove(&item.id);
            tables.apply_delta(item.book_id, RatingDelta::between(item.rating, None));
        }
        tables.sessions.retain(|_, (owner, _)| *owner != user_id);
        for book in tables.books.values_mut() {
            if book.created_by == Some(user_id) {
                book.created_by = None;
            }
        }
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables
            .lock()
            .unwrap()
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let tables = self.tables.lock().unwrap();
        match tables.sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.lock().unwrap().sessions.remove(session_id);
        Ok(())
    }

    async fn get_book_by_id(&self, book_id: Uuid) -> PortResult<Book> {
        self.book(book_id)
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> PortResult<Option<Book>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .books
            .values()
            .find(|b| b.isbns.iter().any(|i| i == isbn))
            .cloned())
    }

    async fn create_book(&self, draft: BookDraft, created_by: Uuid) -> PortResult<Book> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_isbns(&draft.isbns, None)?;
        let now = Utc::now();
        let book = Book {
            id: Uuid::new_v4(),
            title: draft.title,
            subtitle: draft.subtitle,
            author: draft.author,
            publisher: draft.publisher,
            overview: draft.overview,
            release_year: draft.release_year,
            pages: draft.pages,
            cover_url: draft.cover_url,
            genres: draft.genres,
            isbns: draft.isbns,
            rate: draft.rate,
            ratings_count: draft.ratings_count,
            language: draft.language,
            published_date: draft.published_date,
            google_volume_id: draft.google_volume_id,
            preview_link: draft.preview_link,
            info_link: draft.info_link,
            raw: draft.raw,
            source: draft.source,
            created_by: Some(created_by),
            app_rating_sum: 0,
            app_rating_count: 0,
            app_rating_avg: 0.0,
            created_at: now,
            updated_at: now,
        };
        tables.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update_book(&self, book_id: Uuid, update: BookUpdate) -> PortResult<Book> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(isbns) = &update.isbns {
            tables.check_isbns(isbns, Some(book_id))?;
        }
        let book = tables
            .books
            .get_mut(&book_id)
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))?;

        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = update.$field { book.$field = value; })*
            };
        }
        set!(
            title, subtitle, author, publisher, overview, release_year, pages, cover_url,
            genres, isbns, rate, ratings_count, language, published_date, preview_link,
            info_link, raw, source
        );
        book.updated_at = Utc::now();
        Ok(book.clone())
    }

    async fn delete_book(&self, book_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        if tables.books.remove(&book_id).is_none() {
            return Err(PortError::NotFound(format!("Book {} not found", book_id)));
        }
        tables.shelf.retain(|_, item| item.book_id != book_id);
        Ok(())
    }

    async fn list_shelf(&self, user_id: Uuid) -> PortResult<Vec<ShelfEntry>> {
        let tables = self.tables.lock().unwrap();
        let mut entries: Vec<ShelfEntry> = tables
            .shelf
            .values()
            .filter(|item| item.user_id == user_id)
            .filter_map(|item| {
                tables.books.get(&item.book_id).map(|book| ShelfEntry {
                    item: item.clone(),
                    book: book.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| b.item.created_at.cmp(&a.item.created_at));
        Ok(entries)
    }

    async fn get_shelf_item(&self, item_id: Uuid) -> PortResult<ShelfItem> {
        let tables = self.tables.lock().unwrap();
        tables
            .shelf
            .get(&item_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Shelf item {} not found", item_id)))
    }

    async fn add_to_shelf(&self, user_id: Uuid, item: NewShelfItem) -> PortResult<ShelfItem> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.books.contains_key(&item.book_id) {
            return Err(PortError::NotFound(format!("Book {} not found", item.book_id)));
        }
        if tables
            .shelf
            .values()
            .any(|s| s.user_id == user_id && s.book_id == item.book_id)
        {
            return Err(PortError::InvalidArgument("Book already in the shelf".to_string()));
        }
        let now = Utc::now();
        let shelf_item = ShelfItem {
            id: Uuid::new_v4(),
            user_id,
            book_id: item.book_id,
            status: item.status,
            rating: item.rating,
            notes: item.notes,
            pages_read: None,
            created_at: now,
            updated_at: now,
        };
        tables.shelf.insert(shelf_item.id, shelf_item.clone());
        tables.apply_delta(item.book_id, RatingDelta::between(None, item.rating));
        Ok(shelf_item)
    }

    async fn update_shelf_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        update: ShelfItemUpdate,
    ) -> PortResult<ShelfItem> {
        let mut tables = self.tables.lock().unwrap();
        let item = tables.owned_item(user_id, item_id)?;
        let old_rating = item.rating;
        if let Some(status) = update.status {
            item.status = status;
        }
        if let Some(rating) = update.rating {
            item.rating = rating;
        }
        if let Some(notes) = update.notes {
            item.notes = notes;
        }
        if let Some(pages_read) = update.pages_read {
            item.pages_read = pages_read;
        }
        item.updated_at = Utc::now();
        let updated = item.clone();
        tables.apply_delta(updated.book_id, RatingDelta::between(old_rating, updated.rating));
        Ok(updated)
    }

    async fn set_shelf_item_rating(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        rating: Option<Rating>,
    ) -> PortResult<ShelfItem> {
        self.update_shelf_item(
            user_id,
            item_id,
            ShelfItemUpdate {
                rating: Some(rating),
                ..Default::default()
            },
        )
        .await
    }

    async fn remove_shelf_item(&self, user_id: Uuid, item_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let item = tables.owned_item(user_id, item_id)?.clone();
        tables.shelf.remove(&item_id);
        tables.apply_delta(item.book_id, RatingDelta::between(item.rating, None));
        Ok(())
    }
}

//=========================================================================================
// Canned catalog
//=========================================================================================

/// Serves volumes keyed by normalized ISBN; anything else is "not found".
#[derive(Default)]
pub struct StubCatalog {
    volumes: HashMap<String, CatalogVolume>,
}

impl StubCatalog {
    pub fn with_volume(mut self, isbn: &str, volume: CatalogVolume) -> Self {
        self.volumes.insert(isbn.to_string(), volume);
        self
    }
}

#[async_trait]
impl CatalogService for StubCatalog {
    async fn lookup_isbn(&self, isbn: &str) -> PortResult<Option<CatalogVolume>> {
        if isbn == "0000000000" {
            return Err(PortError::Upstream("catalog unavailable".to_string()));
        }
        Ok(self.volumes.get(isbn).cloned())
    }
}

/// A Dune-like volume carrying both an ISBN-10 and an ISBN-13.
pub fn sample_volume(isbn10: &str, isbn13: &str, average_rating: Option<f64>) -> CatalogVolume {
    CatalogVolume {
        volume_id: Some(format!("vol-{}", isbn13)),
        title: Some("Dune".to_string()),
        authors: vec!["Frank Herbert".to_string()],
        publisher: Some("Ace".to_string()),
        published_date: Some("1990-09-01".to_string()),
        page_count: Some(535),
        categories: vec!["Fiction".to_string()],
        thumbnail: Some("http://books.example/dune.jpg".to_string()),
        average_rating,
        ratings_count: average_rating.map(|_| 120),
        language: Some("en".to_string()),
        industry_identifiers: vec![
            IndustryIdentifier {
                kind: "ISBN_10".to_string(),
                identifier: isbn10.to_string(),
            },
            IndustryIdentifier {
                kind: "ISBN_13".to_string(),
                identifier: isbn13.to_string(),
            },
        ],
        raw: serde_json::json!({ "title": "Dune" }),
        ..Default::default()
    }
}

//=========================================================================================
// Server harness
//=========================================================================================

pub struct TestApp {
    pub addr: SocketAddr,
    pub db: Arc<InMemoryDb>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused".to_string()),
        "GOOGLE_BOOKS_API_KEY" => Some("test-key".to_string()),
        _ => None,
    })
    .expect("test config")
}

/// Serves the production router over the in-memory adapters.
pub async fn spawn_app(catalog: StubCatalog) -> TestApp {
    let db = Arc::new(InMemoryDb::default());
    let state = Arc::new(AppState {
        db: db.clone(),
        catalog: Arc::new(catalog),
        config: Arc::new(test_config()),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, web::router(state))
            .await
            .expect("test server");
    });

    TestApp {
        addr,
        db,
        client: reqwest::Client::new(),
    }
}
