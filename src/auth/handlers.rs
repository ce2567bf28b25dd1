use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::token;
use crate::db::models::PublicUser;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::extractors::bearer_token;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: Option<String>,
    pub password: Option<String>,
}

/// Matches the `local@domain.tld` shape: one `@`, no whitespace, and a
/// dotted domain with non-empty segments.
pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.chars().any(|c| c.is_whitespace()) {
        return false;
    }
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = match parts.next() {
        Some(d) => d,
        None => return false,
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// POST /api/auth/register — create a user; the caller logs in separately.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    let username = req
        .username
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Username is required".into()))?;
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Email is required".into()))?;
    let password = req
        .password
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Password is required".into()))?;

    if !is_valid_email(email) {
        return Err(AppError::BadRequest("Invalid email format".into()));
    }

    let conn = state.db.get()?;

    // Email and username uniqueness are checked independently
    if users::find_by_email(&conn, email)?.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }
    if users::find_by_username(&conn, username)?.is_some() {
        return Err(AppError::Conflict("Username already taken".into()));
    }

    let password_hash = bcrypt::hash(password, 10)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    conn.execute(
        "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
        rusqlite::params![username, email, password_hash],
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "User created" })),
    )
        .into_response())
}

/// POST /api/auth/login — exchange credentials for a session token.
///
/// An identifier containing `@` is matched against email, anything else
/// against username. Unknown user and bad password both surface as 400 so
/// the status code does not leak account existence.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let identifier = req
        .identifier
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Identifier is required".into()))?;
    let password = req
        .password
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Password is required".into()))?;

    let conn = state.db.get()?;

    let user = if identifier.contains('@') {
        users::find_by_email(&conn, identifier)?
    } else {
        users::find_by_username(&conn, identifier)?
    }
    .ok_or_else(|| AppError::BadRequest("User not found".into()))?;

    let valid = bcrypt::verify(password, &user.password_hash).unwrap_or(false);
    if !valid {
        return Err(AppError::BadRequest("Invalid password".into()));
    }

    let token = token::mint_token(
        user.id,
        &user.username,
        &state.config.auth.token_secret,
        state.config.auth.token_hours,
    )
    .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))?;

    let user = PublicUser::from(user);
    Ok(Json(json!({ "success": true, "token": token, "user": user })).into_response())
}

/// POST /api/auth/refresh — re-sign a still-valid token with a fresh
/// expiry. Missing credential is 401; an invalid or expired one is 403.
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let old = bearer_token(&headers).ok_or(AppError::Unauthenticated)?;

    let token = token::refresh_token(
        old,
        &state.config.auth.token_secret,
        state.config.auth.token_hours,
    )
    .map_err(|_| AppError::Forbidden)?;

    Ok(Json(json!({ "success": true, "token": token })).into_response())
}
