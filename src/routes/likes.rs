use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde_json::json;

use crate::db::models::Like;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/posts/{id}/like",
        get(list_likes).post(add_like).delete(remove_like),
    )
}

/// GET /api/posts/{id}/like
async fn list_likes(State(state): State<AppState>, Path(post_id): Path<i64>) -> AppResult<Response> {
    let conn = state.db.get()?;
    let mut stmt = conn.prepare(
        "SELECT post_id, user_id, created_at FROM likes WHERE post_id = ?1 ORDER BY created_at ASC",
    )?;
    let likes = stmt
        .query_map(params![post_id], |row| {
            Ok(Like {
                post_id: row.get(0)?,
                user_id: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(json!({ "success": true, "likes": likes })).into_response())
}

/// POST /api/posts/{id}/like — at most one like per (user, post). The
/// pre-insert scan gives a clean 409 for sequential duplicates; the
/// composite primary key closes the race for concurrent ones, and that
/// constraint violation maps to 409 as well.
async fn add_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;

    // Verify post exists
    let _: i64 = conn
        .query_row(
            "SELECT id FROM posts WHERE id = ?1",
            params![post_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound("Post"))?;

    let already: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user.id],
        |r| r.get(0),
    )?;
    if already {
        return Err(AppError::Conflict("Already liked".into()));
    }

    match conn.execute(
        "INSERT INTO likes (post_id, user_id) VALUES (?1, ?2)",
        params![post_id, user.id],
    ) {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict("Already liked".into()));
        }
        Err(e) => return Err(e.into()),
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Like added" })),
    )
        .into_response())
}

/// DELETE /api/posts/{id}/like
async fn remove_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;

    let removed = conn.execute(
        "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user.id],
    )?;
    if removed == 0 {
        return Err(AppError::NotFound("Like"));
    }

    Ok(Json(json!({ "success": true, "message": "Like removed" })).into_response())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
