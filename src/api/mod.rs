//! REST API for managing users, feeds and follows.
//!
//! All routes live under `/v1`. Authenticated routes read the caller from an
//! `Authorization: ApiKey <key>` header via [`AuthUser`]. Errors are returned
//! as `{"error": "..."}` bodies.

mod auth;
mod error;
mod handlers;

use std::time::Duration;

use axum::{
    http::{header::LINK, Method},
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::storage::Database;

pub use auth::{get_api_key, AuthError, AuthUser};
pub use error::{ApiError, ApiResult};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

pub fn create_router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/err", get(handlers::err))
        .route("/users", get(handlers::get_user).post(handlers::create_user))
        .route("/feeds", get(handlers::get_feeds).post(handlers::create_feed))
        .route(
            "/feed_follows",
            get(handlers::get_feed_follows).post(handlers::create_feed_follow),
        )
        .route(
            "/feed_follows/{feed_follow_id}",
            delete(handlers::delete_feed_follow),
        );

    Router::new()
        .nest("/v1", v1)
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

/// Browser clients may call the API from any origin.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers([LINK])
        .max_age(Duration::from_secs(300))
}
