use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::PublicUser;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

const AVATAR_MAX_BYTES: usize = 2 * 1024 * 1024;

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/user/me", get(get_profile).put(update_profile))
        .route(
            "/api/user/me/avatar",
            // Leave headroom above the avatar limit for multipart framing
            post(upload_avatar).layer(DefaultBodyLimit::max(3 * 1024 * 1024)),
        )
        .route("/api/user/{userid}", get(get_user_by_id))
}

/// GET /api/user/me — the token is trusted at the guard, but the profile
/// itself still has to exist.
async fn get_profile(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    let found = users::find_by_id(&conn, user.id)?.ok_or(AppError::NotFound("User"))?;

    Ok(Json(json!({ "success": true, "user": PublicUser::from(found) })).into_response())
}

/// GET /api/user/{userid}
async fn get_user_by_id(
    State(state): State<AppState>,
    Path(userid): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let found = users::find_by_id(&conn, userid)?.ok_or(AppError::NotFound("User"))?;

    Ok(Json(json!({ "success": true, "user": PublicUser::from(found) })).into_response())
}

/// PUT /api/user/me — username and email are required; uniqueness is
/// re-checked against every *other* user so keeping your own values is
/// always allowed. Password changes are opt-in.
async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Response> {
    let username = req
        .username
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Email and username are required".into()))?;
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Email and username are required".into()))?;

    if !crate::auth::handlers::is_valid_email(email) {
        return Err(AppError::BadRequest("Invalid email format".into()));
    }

    let conn = state.db.get()?;

    if let Some(other) = users::find_by_username(&conn, username)? {
        if other.id != user.id {
            return Err(AppError::BadRequest("Username already taken".into()));
        }
    }
    if let Some(other) = users::find_by_email(&conn, email)? {
        if other.id != user.id {
            return Err(AppError::BadRequest("Email already taken".into()));
        }
    }

    match req.password.as_deref().filter(|s| !s.is_empty()) {
        Some(password) => {
            let password_hash = bcrypt::hash(password, 10)
                .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;
            conn.execute(
                "UPDATE users SET username = ?1, email = ?2, password_hash = ?3 WHERE id = ?4",
                params![username, email, password_hash, user.id],
            )?;
        }
        None => {
            conn.execute(
                "UPDATE users SET username = ?1, email = ?2 WHERE id = ?3",
                params![username, email, user.id],
            )?;
        }
    }

    let updated = users::find_by_id(&conn, user.id)?.ok_or(AppError::NotFound("User"))?;

    Ok(Json(json!({ "success": true, "user": PublicUser::from(updated) })).into_response())
}

/// POST /api/user/me/avatar — multipart `avatar` field, image only,
/// capped at 2 MB. Stored filenames are namespaced by user id and
/// timestamp so uploads never collide.
async fn upload_avatar(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::BadRequest("Invalid multipart body".into()))?
    {
        if field.name() != Some("avatar") {
            continue;
        }

        let content_type = field.content_type().unwrap_or("").to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::BadRequest("Only image uploads are allowed".into()));
        }

        let ext = field
            .file_name()
            .and_then(|name| name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()))
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| {
                content_type
                    .strip_prefix("image/")
                    .unwrap_or("bin")
                    .to_string()
            });

        let data = field
            .bytes()
            .await
            .map_err(|_| AppError::BadRequest("Upload too large".into()))?;
        if data.len() > AVATAR_MAX_BYTES {
            return Err(AppError::BadRequest("Avatar must be 2MB or less".into()));
        }

        file = Some((ext, data.to_vec()));
        break;
    }

    let (ext, data) = file.ok_or_else(|| AppError::BadRequest("No file uploaded".into()))?;

    let filename = format!("{}_{}.{}", user.id, Utc::now().timestamp_millis(), ext);
    let path = state.config.uploads_path().join(&filename);
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store avatar: {}", e)))?;

    let avatar_url = format!("/uploads/{}", filename);

    let conn = state.db.get()?;
    let updated = conn.execute(
        "UPDATE users SET avatar_url = ?1 WHERE id = ?2",
        params![avatar_url, user.id],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound("User"));
    }

    Ok(Json(json!({ "success": true, "avatar_url": avatar_url })).into_response())
}
