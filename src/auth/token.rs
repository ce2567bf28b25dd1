use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims embedded in every session token.
///
/// Verified statelessly: no revocation handle, no store lookup. The token
/// is the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user ID (matches `users.id`).
    pub sub: i64,
    pub username: String,
    /// Issued-at (Unix timestamp, seconds).
    pub iat: i64,
    /// Expiry (Unix timestamp, seconds).
    pub exp: i64,
}

/// Sign a fresh token for a user, expiring `hours` from now.
pub fn mint_token(
    user_id: i64,
    username: &str,
    secret: &str,
    hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        iat: now,
        exp: now + hours * 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify signature and expiry; returns the claims on success.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Re-sign the identity claims of a still-valid token with a fresh
/// issued-at and expiry. Temporal claims from the old token are discarded,
/// so refreshing before each expiry extends the session indefinitely.
pub fn refresh_token(
    token: &str,
    secret: &str,
    hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = verify_token(token, secret)?;
    mint_token(claims.sub, &claims.username, secret, hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn mint_and_verify_round_trip() {
        let token = mint_token(42, "alice", SECRET, 1).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = mint_token(42, "alice", SECRET, 1).unwrap();
        // Flip a character in the signature segment
        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'a' { 'b' } else { 'a' });
        assert!(verify_token(&tampered, SECRET).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint_token(42, "alice", SECRET, 1).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // jsonwebtoken applies 60s of default leeway, so back-date well past it
        let token = mint_token(42, "alice", SECRET, -2).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn refresh_issues_new_expiry() {
        let old = mint_token(42, "alice", SECRET, 1).unwrap();
        let old_claims = verify_token(&old, SECRET).unwrap();

        let new = refresh_token(&old, SECRET, 1).unwrap();
        let new_claims = verify_token(&new, SECRET).unwrap();

        assert_eq!(new_claims.sub, old_claims.sub);
        assert_eq!(new_claims.username, old_claims.username);
        assert!(new_claims.exp >= old_claims.exp);
    }

    #[test]
    fn refresh_of_expired_token_fails() {
        let old = mint_token(42, "alice", SECRET, -2).unwrap();
        assert!(refresh_token(&old, SECRET, 1).is_err());
    }
}
