//! services/api/src/web/shelf.rs
//!
//! Shelf endpoints. Every route acts on the authenticated caller's shelf;
//! ownership mismatches stop the request before anything is written.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use bookshelf_core::domain::{NewShelfItem, ShelfEntry, ShelfItem, ShelfItemUpdate, ShelfStatus};
use bookshelf_core::rating::Rating;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::books::BookResponse;
use crate::web::extract::{double_option, ApiJson, ApiPath};
use crate::web::middleware::AuthUser;
use crate::web::rest::{DataResponse, MessageResponse};
use crate::web::state::AppState;

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShelfItemResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    /// PLANNED, READING, READ or DROPPED.
    pub status: String,
    pub rating: Option<i32>,
    pub notes: Option<String>,
    pub pages_read: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ShelfItem> for ShelfItemResponse {
    fn from(item: ShelfItem) -> Self {
        Self {
            id: item.id,
            user_id: item.user_id,
            book_id: item.book_id,
            status: item.status.to_string(),
            rating: item.rating.map(i32::from),
            notes: item.notes,
            pages_read: item.pages_read,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// A shelf item with the full book it tracks.
#[derive(Serialize, ToSchema)]
pub struct ShelfEntryResponse {
    #[serde(flatten)]
    pub item: ShelfItemResponse,
    pub book: BookResponse,
}

impl From<ShelfEntry> for ShelfEntryResponse {
    fn from(entry: ShelfEntry) -> Self {
        Self {
            item: entry.item.into(),
            book: entry.book.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShelfView {
    pub user_id: Uuid,
    pub shelf_items: Vec<ShelfEntryResponse>,
    pub total_books: usize,
}

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToShelfRequest {
    pub book_id: Uuid,
    pub status: Option<String>,
    /// Whole number from 1 to 5.
    pub rating: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateShelfRequest {
    pub status: Option<String>,
    /// Whole number from 1 to 5, or null to clear.
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<f64>)]
    pub rating: Option<Option<f64>>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub pages_read: Option<Option<i64>>,
}

/// Body of the rating endpoint. `rating` must be present: a whole number from
/// 1 to 5, or null to clear.
#[derive(Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct SetRatingRequest {
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<f64>)]
    pub rating: Option<Option<f64>>,
}

fn parse_status(raw: &str) -> Result<ShelfStatus, ApiError> {
    raw.parse::<ShelfStatus>()
        .map_err(|e| ApiError::invalid(e.to_string()))
}

fn parse_rating(raw: Option<f64>) -> Result<Option<Rating>, ApiError> {
    Ok(raw.map(Rating::from_f64).transpose()?)
}

impl UpdateShelfRequest {
    pub fn into_update(self) -> Result<ShelfItemUpdate, ApiError> {
        let pages_read = match self.pages_read {
            Some(Some(pages)) => Some(Some(
                i32::try_from(pages)
                    .ok()
                    .filter(|p| *p >= 0)
                    .ok_or_else(|| ApiError::invalid("pagesRead must be a whole number >= 0"))?,
            )),
            Some(None) => Some(None),
            None => None,
        };

        Ok(ShelfItemUpdate {
            status: self.status.as_deref().map(parse_status).transpose()?,
            rating: self.rating.map(parse_rating).transpose()?,
            notes: self.notes,
            pages_read,
        })
    }
}

/// Loads a shelf item and stops the request unless the caller owns it.
async fn owned_item(state: &AppState, user_id: Uuid, item_id: Uuid) -> Result<ShelfItem, ApiError> {
    let item = state.db.get_shelf_item(item_id).await?;
    if item.user_id != user_id {
        return Err(ApiError::forbidden("Not allowed to modify this shelf item"));
    }
    Ok(item)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /shelf - All shelf items of the caller, newest first, with book data.
#[utoipa::path(
    get,
    path = "/shelf",
    tag = "shelf",
    responses(
        (status = 200, description = "The caller's shelf", body = DataResponse<ShelfView>),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn view_shelf_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.db.list_shelf(user_id).await?;
    let shelf_items: Vec<ShelfEntryResponse> = entries.into_iter().map(Into::into).collect();
    Ok(Json(DataResponse::new(ShelfView {
        user_id,
        total_books: shelf_items.len(),
        shelf_items,
    })))
}

/// POST /shelf - Add a book to the caller's shelf.
#[utoipa::path(
    post,
    path = "/shelf",
    tag = "shelf",
    request_body = AddToShelfRequest,
    responses(
        (status = 201, description = "Added", body = DataResponse<ShelfItemResponse>),
        (status = 400, description = "Invalid status or rating, or book already in the shelf", body = ErrorBody),
        (status = 404, description = "Book not found", body = ErrorBody)
    )
)]
pub async fn add_to_shelf_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    ApiJson(req): ApiJson<AddToShelfRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match req.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => ShelfStatus::default(),
    };
    let new_item = NewShelfItem {
        book_id: req.book_id,
        status,
        rating: parse_rating(req.rating)?,
        notes: req.notes,
    };

    let item = state.db.add_to_shelf(user_id, new_item).await?;
    info!("Book {} added to shelf of {}", item.book_id, user_id);
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(ShelfItemResponse::from(item))),
    ))
}

/// PUT /shelf/{id} - Update status, rating, notes or progress.
#[utoipa::path(
    put,
    path = "/shelf/{id}",
    tag = "shelf",
    params(("id" = Uuid, Path, description = "Shelf item id")),
    request_body = UpdateShelfRequest,
    responses(
        (status = 200, description = "Updated", body = DataResponse<ShelfItemResponse>),
        (status = 400, description = "Invalid field", body = ErrorBody),
        (status = 403, description = "Shelf item belongs to another user", body = ErrorBody),
        (status = 404, description = "Shelf item not found", body = ErrorBody)
    )
)]
pub async fn update_shelf_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    ApiPath(item_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateShelfRequest>,
) -> Result<impl IntoResponse, ApiError> {
    owned_item(&state, user_id, item_id).await?;
    let update = req.into_update()?;

    let item = state.db.update_shelf_item(user_id, item_id, update).await?;
    Ok(Json(DataResponse::new(ShelfItemResponse::from(item))))
}

/// PATCH /shelf/shelf/{shelfItemId}/rating - Set or clear a rating and keep
/// the book's rating aggregate in step.
#[utoipa::path(
    patch,
    path = "/shelf/shelf/{shelfItemId}/rating",
    tag = "shelf",
    params(("shelfItemId" = Uuid, Path, description = "Shelf item id")),
    request_body = SetRatingRequest,
    responses(
        (status = 200, description = "Rating saved", body = DataResponse<ShelfItemResponse>),
        (status = 400, description = "Rating is not 1-5 or null", body = ErrorBody),
        (status = 404, description = "No such shelf item for this user", body = ErrorBody)
    )
)]
pub async fn set_rating_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    ApiPath(item_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<SetRatingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(rating) = req.rating else {
        return Err(ApiError::invalid(
            "rating must be a whole number between 1 and 5, or null",
        ));
    };
    let rating = parse_rating(rating)?;

    let item = state
        .db
        .set_shelf_item_rating(user_id, item_id, rating)
        .await?;
    Ok(Json(DataResponse::new(ShelfItemResponse::from(item))))
}

/// DELETE /shelf/{id} - Remove a book from the caller's shelf.
#[utoipa::path(
    delete,
    path = "/shelf/{id}",
    tag = "shelf",
    params(("id" = Uuid, Path, description = "Shelf item id")),
    responses(
        (status = 200, description = "Removed", body = MessageResponse),
        (status = 403, description = "Shelf item belongs to another user", body = ErrorBody),
        (status = 404, description = "Shelf item not found", body = ErrorBody)
    )
)]
pub async fn remove_from_shelf_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    ApiPath(item_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    owned_item(&state, user_id, item_id).await?;
    state.db.remove_shelf_item(user_id, item_id).await?;
    Ok(Json(MessageResponse::success("Book removed from shelf")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_validates_each_field() {
        let req: UpdateShelfRequest =
            serde_json::from_str(r#"{"status": "reading", "rating": null, "pagesRead": 40}"#).unwrap();
        let update = req.into_update().unwrap();
        assert_eq!(update.status, Some(ShelfStatus::Reading));
        assert_eq!(update.rating, Some(None));
        assert_eq!(update.pages_read, Some(Some(40)));
        assert!(update.notes.is_none());

        let req: UpdateShelfRequest = serde_json::from_str(r#"{"rating": 4.5}"#).unwrap();
        assert!(req.into_update().is_err());

        let req: UpdateShelfRequest = serde_json::from_str(r#"{"status": "LOST"}"#).unwrap();
        assert!(req.into_update().is_err());
    }

    #[test]
    fn rating_request_distinguishes_missing_from_null() {
        let missing: SetRatingRequest = serde_json::from_str("{}").unwrap();
        let null: SetRatingRequest = serde_json::from_str(r#"{"rating": null}"#).unwrap();
        let set: SetRatingRequest = serde_json::from_str(r#"{"rating": 3}"#).unwrap();
        assert_eq!(missing.rating, None);
        assert_eq!(null.rating, Some(None));
        assert_eq!(set.rating, Some(Some(3.0)));
    }
}
