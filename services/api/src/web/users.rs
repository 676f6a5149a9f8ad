//! services/api/src/web/users.rs
//!
//! Self-service account endpoints. A caller may only see or change itself.

use axum::{
    extract::State,
    response::IntoResponse,
    Extension, Json,
};
use bookshelf_core::domain::{User, UserUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::auth::{hash_password, normalize_email, validate_name};
use crate::web::extract::{ApiJson, ApiPath};
use crate::web::middleware::AuthUser;
use crate::web::rest::{DataResponse, MessageResponse};
use crate::web::state::AppState;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UpdateUserRequest {
    fn into_update(self) -> Result<UserUpdate, ApiError> {
        let update = UserUpdate {
            name: self.name.as_deref().map(validate_name).transpose()?,
            email: self.email.as_deref().map(normalize_email).transpose()?,
            hashed_password: self.password.as_deref().map(hash_password).transpose()?,
        };
        if update.is_empty() {
            return Err(ApiError::invalid("No fields to update"));
        }
        Ok(update)
    }
}

fn ensure_self(caller: Uuid, target: Uuid, action: &str) -> Result<(), ApiError> {
    if caller != target {
        return Err(ApiError::forbidden(format!("Not allowed to {} this user", action)));
    }
    Ok(())
}

/// GET /users/{id} - View the caller's own account.
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Account", body = DataResponse<UserResponse>),
        (status = 403, description = "Not the caller's account", body = ErrorBody)
    )
)]
pub async fn view_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self(caller, user_id, "view")?;
    let user = state.db.get_user_by_id(user_id).await?;
    Ok(Json(DataResponse::new(UserResponse::from(user))))
}

/// PUT /users/{id} - Change name, email or password.
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated account", body = DataResponse<UserResponse>),
        (status = 400, description = "Invalid field", body = ErrorBody),
        (status = 403, description = "Not the caller's account", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self(caller, user_id, "update")?;
    let update = req.into_update()?;
    let user = state.db.update_user(user_id, update).await?;
    Ok(Json(DataResponse::new(UserResponse::from(user))))
}

/// DELETE /users/{id} - Delete the caller's account, shelf and sessions.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 403, description = "Not the caller's account", body = ErrorBody)
    )
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self(caller, user_id, "delete")?;
    state.db.delete_user(user_id).await?;
    info!("User {} deleted their account", user_id);
    Ok(Json(MessageResponse::success("User deleted")))
}
