pub mod auth;
pub mod books;
pub mod extract;
pub mod middleware;
pub mod rest;
pub mod shelf;
pub mod state;
pub mod users;

pub use middleware::require_auth;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::web::{rest::ApiDoc, state::AppState};

/// Builds the full application router: public auth routes, the protected API
/// and the Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/books/isbn/{isbn}", get(books::preview_book_handler))
        .route(
            "/books/{key}",
            get(books::get_book_handler)
                .post(books::add_book_handler)
                .put(books::update_book_handler)
                .delete(books::delete_book_handler),
        )
        .route(
            "/shelf",
            get(shelf::view_shelf_handler).post(shelf::add_to_shelf_handler),
        )
        .route(
            "/shelf/{id}",
            put(shelf::update_shelf_item_handler).delete(shelf::remove_from_shelf_handler),
        )
        .route(
            "/shelf/shelf/{shelf_item_id}/rating",
            patch(shelf::set_rating_handler),
        )
        .route(
            "/users/{id}",
            get(users::view_user_handler)
                .put(users::update_user_handler)
                .delete(users::delete_user_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
