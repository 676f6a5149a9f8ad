//! services/api/src/web/rest.rs
//!
//! Shared response envelopes and the master definition for the OpenAPI
//! specification.

use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::error::ErrorBody;
use crate::web::{auth, books, shelf, users};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        books::get_book_handler,
        books::preview_book_handler,
        books::add_book_handler,
        books::update_book_handler,
        books::delete_book_handler,
        shelf::view_shelf_handler,
        shelf::add_to_shelf_handler,
        shelf::update_shelf_item_handler,
        shelf::set_rating_handler,
        shelf::remove_from_shelf_handler,
        users::view_user_handler,
        users::update_user_handler,
        users::delete_user_handler,
    ),
    components(
        schemas(ErrorBody, MessageResponse)
    ),
    tags(
        (name = "auth", description = "Account creation and sessions."),
        (name = "books", description = "Catalog lookups and stored books."),
        (name = "shelf", description = "Per-user reading shelf and ratings."),
        (name = "users", description = "Self-service account management.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Envelopes
//=========================================================================================

/// Every successful payload is wrapped as `{"data": ...}`.
#[derive(Serialize, ToSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Acknowledgement for operations that return no entity.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "Success".to_string(),
            message: message.into(),
        }
    }
}
