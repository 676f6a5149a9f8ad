//! services/api/src/web/extract.rs
//!
//! Request body helpers shared by the handlers.

use crate::error::ApiError;
use axum::extract::{FromRequest, FromRequestParts};
use serde::{Deserialize, Deserializer};

/// `axum::Json` whose rejections are rendered as `ApiError` (400 + JSON body).
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` with the same JSON error rendering, so a malformed
/// id is a 400 with an `{"error": ...}` body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`). Use together with `#[serde(default)]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
