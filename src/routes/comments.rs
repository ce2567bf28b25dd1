use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::Comment;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

const COMMENT_MAX: usize = 255;

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/posts/{id}/comments",
            get(list_comments).post(create_comment),
        )
        .route(
            "/api/posts/{id}/comments/{comment_id}",
            axum::routing::delete(delete_comment),
        )
}

/// GET /api/posts/{id}/comments
async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let comments = query_comments(&conn, post_id)?;

    Ok(Json(json!({ "success": true, "comments": comments })).into_response())
}

/// POST /api/posts/{id}/comments
async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Response> {
    let content = req
        .content
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Content is required".into()))?;

    if content.chars().count() > COMMENT_MAX {
        return Err(AppError::BadRequest("Comment is too long".into()));
    }

    let conn = state.db.get()?;

    // Verify post exists
    let _: i64 = conn
        .query_row(
            "SELECT id FROM posts WHERE id = ?1",
            params![post_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound("Post"))?;

    conn.execute(
        "INSERT INTO comments (content, post_id, user_id) VALUES (?1, ?2, ?3)",
        params![content, post_id, user.id],
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Comment added" })),
    )
        .into_response())
}

/// DELETE /api/posts/{id}/comments/{comment_id} — existence before
/// ownership, same as post deletion.
async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((_post_id, comment_id)): Path<(i64, i64)>,
) -> AppResult<Response> {
    let conn = state.db.get()?;

    let author_id: i64 = conn
        .query_row(
            "SELECT user_id FROM comments WHERE id = ?1",
            params![comment_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound("Comment"))?;

    if author_id != user.id {
        return Err(AppError::Forbidden);
    }

    conn.execute("DELETE FROM comments WHERE id = ?1", params![comment_id])?;

    Ok(Json(json!({ "success": true, "message": "Comment deleted" })).into_response())
}

// -- Query helpers --

pub(crate) fn query_comments(
    conn: &rusqlite::Connection,
    post_id: i64,
) -> Result<Vec<Comment>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.created_at
         FROM comments c
         JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.id ASC",
    )?;

    let comments = stmt
        .query_map(params![post_id], |row| {
            Ok(Comment {
                id: row.get(0)?,
                post_id: row.get(1)?,
                user_id: row.get(2)?,
                username: row.get(3)?,
                content: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(comments)
}
