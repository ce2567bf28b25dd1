pub mod ads;
pub mod auth;
pub mod comments;
pub mod likes;
pub mod posts;
pub mod uploads;
pub mod users;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

/// Assemble the full API surface. `main` and the integration tests both
/// build the app from here so they serve identical routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .merge(auth::router())
        .merge(users::router())
        .merge(posts::router())
        .merge(comments::router())
        .merge(likes::router())
        .merge(ads::router())
        .merge(uploads::router())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "success": true, "message": "Backend is running!" }))
}
