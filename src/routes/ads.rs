use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/ads", get(list_ads))
}

/// GET /api/ads — served from the shared cache slot; only an empty cache
/// combined with an upstream failure surfaces an error.
async fn list_ads(State(state): State<AppState>) -> AppResult<Response> {
    let ads = state
        .ads
        .get()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    Ok(Json(ads).into_response())
}
