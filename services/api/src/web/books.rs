//! services/api/src/web/books.rs
//!
//! Book endpoints: catalog preview, import by ISBN, partial update, deletion
//! and the detail view with the resolved display rating.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use bookshelf_core::domain::{Book, BookDraft, BookUpdate};
use bookshelf_core::isbn::{normalize_isbn, normalize_isbn_list};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::extract::{double_option, ApiJson, ApiPath};
use crate::web::middleware::AuthUser;
use crate::web::rest::{DataResponse, MessageResponse};
use crate::web::state::AppState;

//=========================================================================================
// Response Types
//=========================================================================================

/// A stored book with its rating aggregate and the rating shown to users.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
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
    #[serde(rename = "ISBN")]
    pub isbns: Vec<String>,
    pub rate: Option<f64>,
    pub ratings_count: Option<i32>,
    pub language: Option<String>,
    pub published_date: Option<String>,
    pub google_volume_id: Option<String>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub raw: Option<serde_json::Value>,
    pub source: Option<String>,
    pub created_by: Option<Uuid>,
    pub app_rating_sum: i64,
    pub app_rating_count: i32,
    pub app_rating_avg: f64,
    pub display_rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        let display_rating = book.display_rating();
        Self {
            id: book.id,
            title: book.title,
            subtitle: book.subtitle,
            author: book.author,
            publisher: book.publisher,
            overview: book.overview,
            release_year: book.release_year,
            pages: book.pages,
            cover_url: book.cover_url,
            genres: book.genres,
            isbns: book.isbns,
            rate: book.rate,
            ratings_count: book.ratings_count,
            language: book.language,
            published_date: book.published_date,
            google_volume_id: book.google_volume_id,
            preview_link: book.preview_link,
            info_link: book.info_link,
            raw: book.raw,
            source: book.source,
            created_by: book.created_by,
            app_rating_sum: book.app_rating_sum,
            app_rating_count: book.app_rating_count,
            app_rating_avg: book.app_rating_avg,
            display_rating,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// Catalog metadata for an ISBN, not persisted.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookPreview {
    pub title: String,
    pub subtitle: Option<String>,
    pub author: String,
    pub publisher: String,
    pub overview: Option<String>,
    pub release_year: i32,
    pub pages: i32,
    pub cover_url: Option<String>,
    pub genres: Vec<String>,
    #[serde(rename = "ISBN")]
    pub isbns: Vec<String>,
    pub rate: Option<f64>,
    pub ratings_count: Option<i32>,
    pub language: Option<String>,
    pub published_date: Option<String>,
    pub google_volume_id: Option<String>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub raw: Option<serde_json::Value>,
    pub source: Option<String>,
}

impl From<BookDraft> for BookPreview {
    fn from(draft: BookDraft) -> Self {
        Self {
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
        }
    }
}

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct AddBookRequest {
    /// Page count of the edition being added. Must be a whole number > 0.
    pub pages: Option<f64>,
}

/// Partial update. Absent fields are left alone; `null` clears nullable ones.
#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub subtitle: Option<Option<String>>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub overview: Option<Option<String>>,
    pub release_year: Option<i64>,
    pub pages: Option<i64>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub cover_url: Option<Option<String>>,
    pub genres: Option<Vec<String>>,
    #[serde(rename = "ISBN")]
    pub isbns: Option<Vec<String>>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<f64>)]
    pub rate: Option<Option<f64>>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub ratings_count: Option<Option<i64>>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub language: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub published_date: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub preview_link: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub info_link: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<Object>)]
    pub raw: Option<Option<serde_json::Value>>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub source: Option<Option<String>>,
}

fn positive_pages(pages: f64) -> Result<i32, ApiError> {
    if !pages.is_finite() || pages.fract() != 0.0 || pages <= 0.0 || pages > f64::from(i32::MAX) {
        return Err(ApiError::invalid("pages must be a whole number greater than 0"));
    }
    Ok(pages as i32)
}

fn non_negative_i32(value: i64, field: &str) -> Result<i32, ApiError> {
    i32::try_from(value)
        .ok()
        .filter(|v| *v >= 0)
        .ok_or_else(|| ApiError::invalid(format!("{} is invalid", field)))
}

impl UpdateBookRequest {
    /// Validates every supplied field and builds the domain update.
    pub fn into_update(self) -> Result<BookUpdate, ApiError> {
        let release_year = self
            .release_year
            .map(|year| non_negative_i32(year, "releaseYear"))
            .transpose()?;

        let pages = match self.pages {
            Some(pages) if pages > 0 => Some(
                i32::try_from(pages).map_err(|_| ApiError::invalid("pages is invalid"))?,
            ),
            Some(_) => return Err(ApiError::invalid("pages must be greater than 0")),
            None => None,
        };

        if let Some(Some(rate)) = self.rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(ApiError::invalid("rate is invalid"));
            }
        }

        let ratings_count = match self.ratings_count {
            Some(Some(count)) => Some(Some(non_negative_i32(count, "ratingsCount")?)),
            Some(None) => Some(None),
            None => None,
        };

        let isbns = match self.isbns {
            Some(values) => {
                let isbns = normalize_isbn_list(&values);
                if isbns.is_empty() {
                    return Err(ApiError::invalid("ISBN must contain at least one valid value"));
                }
                Some(isbns)
            }
            None => None,
        };

        let update = BookUpdate {
            title: self.title,
            subtitle: self.subtitle,
            author: self.author,
            publisher: self.publisher,
            overview: self.overview,
            release_year,
            pages,
            cover_url: self.cover_url,
            genres: self.genres,
            isbns,
            rate: self.rate,
            ratings_count,
            language: self.language,
            published_date: self.published_date,
            preview_link: self.preview_link,
            info_link: self.info_link,
            raw: self.raw,
            source: self.source,
        };

        if update.is_empty() {
            return Err(ApiError::invalid("No fields to update"));
        }
        Ok(update)
    }
}

fn isbn_param(raw: &str) -> Result<String, ApiError> {
    let isbn = normalize_isbn(raw);
    if isbn.is_empty() {
        return Err(ApiError::invalid("ISBN must contain digits"));
    }
    Ok(isbn)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /books/{id} - Book detail with the resolved display rating.
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book found", body = DataResponse<BookResponse>),
        (status = 404, description = "Book not found", body = ErrorBody)
    )
)]
pub async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(book_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let book = state.db.get_book_by_id(book_id).await?;
    Ok(Json(DataResponse::new(BookResponse::from(book))))
}

/// GET /books/isbn/{isbn} - Catalog metadata for an ISBN, not persisted.
#[utoipa::path(
    get,
    path = "/books/isbn/{isbn}",
    tag = "books",
    params(("isbn" = String, Path, description = "ISBN-10 or ISBN-13, hyphens allowed")),
    responses(
        (status = 200, description = "Catalog preview", body = DataResponse<BookPreview>),
        (status = 404, description = "No catalog match", body = ErrorBody),
        (status = 502, description = "Catalog failure", body = ErrorBody)
    )
)]
pub async fn preview_book_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(isbn): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let isbn = isbn_param(&isbn)?;
    let volume = state
        .catalog
        .lookup_isbn(&isbn)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found in catalog"))?;

    let preview = BookPreview::from(volume.to_draft(&isbn, None));
    Ok(Json(DataResponse::new(preview)))
}

/// POST /books/{isbn} - Import a book from the catalog.
#[utoipa::path(
    post,
    path = "/books/{isbn}",
    tag = "books",
    params(("isbn" = String, Path, description = "ISBN-10 or ISBN-13, hyphens allowed")),
    request_body = AddBookRequest,
    responses(
        (status = 201, description = "Book created", body = DataResponse<BookResponse>),
        (status = 400, description = "Invalid pages", body = ErrorBody),
        (status = 404, description = "No catalog match", body = ErrorBody),
        (status = 409, description = "A book already uses one of the ISBNs", body = ErrorBody),
        (status = 502, description = "Catalog failure", body = ErrorBody)
    )
)]
pub async fn add_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    ApiPath(isbn): ApiPath<String>,
    ApiJson(req): ApiJson<AddBookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let isbn = isbn_param(&isbn)?;
    let Some(pages) = req.pages else {
        return Err(ApiError::invalid("pages is required and must be a number greater than 0"));
    };
    let pages = positive_pages(pages)?;

    let volume = state
        .catalog
        .lookup_isbn(&isbn)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found in catalog"))?;

    let book = state
        .db
        .create_book(volume.to_draft(&isbn, Some(pages)), user_id)
        .await?;
    info!("Book {} imported for ISBN {} by {}", book.id, isbn, user_id);

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(BookResponse::from(book))),
    ))
}

/// PUT /books/{isbn} - Partial update of the book holding this ISBN.
#[utoipa::path(
    put,
    path = "/books/{isbn}",
    tag = "books",
    params(("isbn" = String, Path, description = "Any ISBN of the book")),
    request_body = UpdateBookRequest,
    responses(
        (status = 200, description = "Book updated", body = DataResponse<BookResponse>),
        (status = 400, description = "Invalid field", body = ErrorBody),
        (status = 404, description = "Book not found", body = ErrorBody),
        (status = 409, description = "ISBN used by another book", body = ErrorBody)
    )
)]
pub async fn update_book_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(isbn): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateBookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let isbn = isbn_param(&isbn)?;
    let Some(existing) = state.db.find_book_by_isbn(&isbn).await? else {
        return Err(ApiError::not_found("Book not found"));
    };

    let update = req.into_update()?;
    let book = state.db.update_book(existing.id, update).await?;
    Ok(Json(DataResponse::new(BookResponse::from(book))))
}

/// DELETE /books/{isbn} - Delete the book holding this ISBN.
#[utoipa::path(
    delete,
    path = "/books/{isbn}",
    tag = "books",
    params(("isbn" = String, Path, description = "Any ISBN of the book")),
    responses(
        (status = 200, description = "Book deleted", body = MessageResponse),
        (status = 404, description = "Book not found", body = ErrorBody)
    )
)]
pub async fn delete_book_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(isbn): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let isbn = isbn_param(&isbn)?;
    let Some(existing) = state.db.find_book_by_isbn(&isbn).await? else {
        return Err(ApiError::not_found("Book not found"));
    };

    state.db.delete_book(existing.id).await?;
    info!("Book {} deleted", existing.id);
    Ok(Json(MessageResponse::success("Book deleted")))
}
