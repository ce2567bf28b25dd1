use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::models::Comment;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::comments::query_comments;
use crate::state::AppState;

const TITLE_MAX: usize = 255;
const CONTENT_MAX: usize = 1000;

// -- View structs --

/// A post as served by the listing endpoints: joined author name plus
/// derived comment and like aggregates.
#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub username: String,
    pub created_at: String,
    pub comments: Vec<Comment>,
    #[serde(rename = "likesCount")]
    pub likes_count: i64,
    #[serde(rename = "likedByCurrentUser")]
    pub liked_by_current_user: bool,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/search", get(search_posts))
        .route("/api/posts/{id}", get(get_post).delete(delete_post))
}

// -- Handlers --

/// GET /api/posts — newest first, paginated, with comment and like
/// aggregates. `likedByCurrentUser` is false for anonymous callers.
async fn list_posts(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Response> {
    let limit = i64::from(page.limit.unwrap_or(10).max(1));
    let page_no = i64::from(page.page.unwrap_or(1).max(1));
    let offset = (page_no - 1) * limit;

    let uid = user.map(|u| u.id).unwrap_or(-1);

    let conn = state.db.get()?;
    let mut stmt = conn.prepare(
        "SELECT p.id, p.title, p.content, p.user_id, p.created_at, u.username,
                COALESCE((SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id), 0) AS likes_count,
                COALESCE((SELECT COUNT(*) > 0 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?1), 0) AS liked
         FROM posts p
         JOIN users u ON u.id = p.user_id
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?2 OFFSET ?3",
    )?;

    let mut posts = stmt
        .query_map(params![uid, limit, offset], row_to_post_view)?
        .collect::<Result<Vec<_>, _>>()?;

    for post in &mut posts {
        post.comments = query_comments(&conn, post.id)?;
    }

    Ok(Json(json!({ "success": true, "posts": posts })).into_response())
}

/// GET /api/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let uid = user.map(|u| u.id).unwrap_or(-1);

    let conn = state.db.get()?;
    let mut post = conn
        .query_row(
            "SELECT p.id, p.title, p.content, p.user_id, p.created_at, u.username,
                    COALESCE((SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id), 0) AS likes_count,
                    COALESCE((SELECT COUNT(*) > 0 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?2), 0) AS liked
             FROM posts p
             JOIN users u ON u.id = p.user_id
             WHERE p.id = ?1",
            params![id, uid],
            row_to_post_view,
        )
        .map_err(|_| AppError::NotFound("Post"))?;

    post.comments = query_comments(&conn, post.id)?;

    Ok(Json(json!({ "success": true, "post": post })).into_response())
}

/// POST /api/posts
async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Response> {
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Title and content are required".into()))?;
    let content = req
        .content
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Title and content are required".into()))?;

    if title.chars().count() > TITLE_MAX {
        return Err(AppError::BadRequest("Title is too long".into()));
    }
    if content.chars().count() > CONTENT_MAX {
        return Err(AppError::BadRequest("Content is too long".into()));
    }

    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO posts (title, content, user_id) VALUES (?1, ?2, ?3)",
        params![title, content, user.id],
    )?;
    let post_id = conn.last_insert_rowid();

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Post created", "postId": post_id })),
    )
        .into_response())
}

/// DELETE /api/posts/{id} — existence is checked before ownership so a
/// missing post is always 404 and a foreign post is always 403.
async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;

    let owner_id: i64 = conn
        .query_row("SELECT user_id FROM posts WHERE id = ?1", params![id], |r| {
            r.get(0)
        })
        .map_err(|_| AppError::NotFound("Post"))?;

    if owner_id != user.id {
        return Err(AppError::Forbidden);
    }

    conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;

    Ok(Json(json!({ "success": true, "message": "Post deleted" })).into_response())
}

/// GET /api/posts/search?query=... — hashtag terms must all appear in the
/// content; otherwise the plain text matches title or content.
async fn search_posts(
    State(state): State<AppState>,
    Query(search): Query<SearchQuery>,
) -> AppResult<Response> {
    let query = search
        .query
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Query is required".into()))?;

    let hashtags = extract_hashtags(query);
    let plain = strip_hashtags(query);

    let mut sql = String::from(
        "SELECT p.id, p.title, p.content, p.user_id, p.created_at, u.username,
                COALESCE((SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id), 0) AS likes_count,
                0 AS liked
         FROM posts p
         JOIN users u ON u.id = p.user_id
         WHERE ",
    );
    let params: Vec<String> = if hashtags.is_empty() {
        sql.push_str("(p.title LIKE ?1 OR p.content LIKE ?2)");
        vec![format!("%{}%", plain), format!("%{}%", plain)]
    } else {
        let clauses: Vec<String> = (1..=hashtags.len())
            .map(|i| format!("p.content LIKE ?{}", i))
            .collect();
        sql.push_str(&clauses.join(" AND "));
        hashtags.iter().map(|tag| format!("%{}%", tag)).collect()
    };
    sql.push_str(" ORDER BY p.created_at DESC, p.id DESC");

    let conn = state.db.get()?;
    let mut stmt = conn.prepare(&sql)?;
    let mut posts = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), row_to_post_view)?
        .collect::<Result<Vec<_>, _>>()?;

    for post in &mut posts {
        post.comments = query_comments(&conn, post.id)?;
    }

    Ok(Json(json!({ "success": true, "posts": posts })).into_response())
}

// -- Query helpers --

fn row_to_post_view(row: &rusqlite::Row) -> rusqlite::Result<PostView> {
    Ok(PostView {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        user_id: row.get(3)?,
        created_at: row.get(4)?,
        username: row.get(5)?,
        likes_count: row.get(6)?,
        liked_by_current_user: row.get(7)?,
        comments: Vec::new(),
    })
}

/// Collect `#word` tokens (letters, digits, underscore).
fn extract_hashtags(query: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut chars = query.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '#' {
            let mut tag = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    tag.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if !tag.is_empty() {
                tags.push(format!("#{}", tag));
            }
        }
    }
    tags
}

/// Remove `#word` tokens, leaving the plain-text remainder.
fn strip_hashtags(query: &str) -> String {
    let mut out = String::new();
    let mut chars = query.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '#' {
            let mut consumed = false;
            while let Some(&next) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    chars.next();
                    consumed = true;
                } else {
                    break;
                }
            }
            // A bare '#' with no word after it stays in the text
            if !consumed {
                out.push('#');
            }
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}
