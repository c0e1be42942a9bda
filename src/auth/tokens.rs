//! Access/refresh token pairs signed with HS256.
//!
//! Access tokens are verified statelessly. Refresh tokens are additionally
//! bound to a server-side list (`refresh_tokens` table): a refresh token is
//! live only while a row for it exists. Rotation swaps the presented token
//! for a fresh pair inside one write transaction; a verifiable token that is
//! missing from the list is treated as reuse and clears the whole list.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,

    #[error("expired token")]
    Expired,

    #[error("refresh token reuse detected")]
    Reuse,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid | TokenError::Expired | TokenError::Reuse => {
                AppError::Unauthorized
            }
            TokenError::Database(e) => AppError::Database(e),
            TokenError::Pool(e) => AppError::Pool(e),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    nonce: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

fn encode_token(
    secret: &str,
    user_id: &str,
    nonce: &str,
    ttl: Duration,
) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        nonce: nonce.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| TokenError::Invalid)
}

// Stored expiries are compared against datetime('now') in SQL, so they must
// use SQLite's own text format, not RFC3339.
fn sqlite_datetime(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn decode_token(secret: &str, token: &str) -> Result<Claims, TokenError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })
}

/// Mint an access/refresh pair for `user_id` and append the refresh token to
/// the user's server-side list. Expired rows for the user are pruned on the
/// same connection.
pub fn issue_pair(pool: &DbPool, auth: &AuthConfig, user_id: &str) -> Result<TokenPair, TokenError> {
    let nonce = uuid::Uuid::now_v7().to_string();
    let access = encode_token(
        &auth.access_token_secret,
        user_id,
        &nonce,
        Duration::minutes(auth.access_ttl_minutes),
    )?;
    let refresh_ttl = Duration::days(auth.refresh_ttl_days);
    let refresh = encode_token(&auth.refresh_token_secret, user_id, &nonce, refresh_ttl)?;

    let conn = pool.get()?;
    conn.execute(
        "DELETE FROM refresh_tokens WHERE user_id = ?1 AND expires_at < datetime('now')",
        params![user_id],
    )?;
    conn.execute(
        "INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?1, ?2, ?3)",
        params![user_id, refresh, sqlite_datetime(Utc::now() + refresh_ttl)],
    )?;

    Ok(TokenPair {
        access_token: access,
        refresh_token: refresh,
    })
}

/// Stateless access-token check: signature and expiry only, no database read.
pub fn verify_access(auth: &AuthConfig, token: &str) -> Result<String, TokenError> {
    decode_token(&auth.access_token_secret, token).map(|claims| claims.sub)
}

/// Exchange a live refresh token for a fresh pair.
///
/// The membership check, removal of the presented token and append of its
/// replacement happen under one immediate transaction, so concurrent
/// rotations of the same token serialize: the first writer wins and the
/// loser observes reuse. A verifiable token with no matching row clears the
/// user's entire list before failing.
pub fn rotate(pool: &DbPool, auth: &AuthConfig, refresh: &str) -> Result<TokenPair, TokenError> {
    let claims = decode_token(&auth.refresh_token_secret, refresh)?;
    let user_id = claims.sub;

    let conn = pool.get()?;
    conn.execute("BEGIN IMMEDIATE", [])?;

    let result: Result<TokenPair, TokenError> = (|| {
        let present: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM refresh_tokens WHERE user_id = ?1 AND token = ?2",
            params![user_id, refresh],
            |row| row.get(0),
        )?;

        if !present {
            conn.execute(
                "DELETE FROM refresh_tokens WHERE user_id = ?1",
                params![user_id],
            )?;
            return Err(TokenError::Reuse);
        }

        conn.execute(
            "DELETE FROM refresh_tokens WHERE rowid IN (
                SELECT rowid FROM refresh_tokens WHERE user_id = ?1 AND token = ?2 LIMIT 1
            )",
            params![user_id, refresh],
        )?;

        let nonce = uuid::Uuid::now_v7().to_string();
        let access = encode_token(
            &auth.access_token_secret,
            &user_id,
            &nonce,
            Duration::minutes(auth.access_ttl_minutes),
        )?;
        let refresh_ttl = Duration::days(auth.refresh_ttl_days);
        let new_refresh = encode_token(&auth.refresh_token_secret, &user_id, &nonce, refresh_ttl)?;

        conn.execute(
            "INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?1, ?2, ?3)",
            params![user_id, new_refresh, sqlite_datetime(Utc::now() + refresh_ttl)],
        )?;

        Ok(TokenPair {
            access_token: access,
            refresh_token: new_refresh,
        })
    })();

    match result {
        Ok(pair) => {
            conn.execute("COMMIT", [])?;
            Ok(pair)
        }
        // Reuse clearing must persist; everything else rolls back
        Err(TokenError::Reuse) => {
            conn.execute("COMMIT", [])?;
            Err(TokenError::Reuse)
        }
        Err(e) => {
            conn.execute("ROLLBACK", [])?;
            Err(e)
        }
    }
}

/// Remove one matching refresh token from its owner's list. A verifiable
/// token that is not in the list is not an error; returns whether a row was
/// removed.
pub fn revoke(pool: &DbPool, auth: &AuthConfig, refresh: &str) -> Result<bool, TokenError> {
    let claims = decode_token(&auth.refresh_token_secret, refresh)?;

    let conn = pool.get()?;
    let removed = conn.execute(
        "DELETE FROM refresh_tokens WHERE rowid IN (
            SELECT rowid FROM refresh_tokens WHERE user_id = ?1 AND token = ?2 LIMIT 1
        )",
        params![claims.sub, refresh],
    )?;
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_auth() -> AuthConfig {
        AuthConfig {
            access_token_secret: "access-secret".to_string(),
            refresh_token_secret: "refresh-secret".to_string(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 30,
            google_client_id: None,
        }
    }

    fn pool_with_user(user_id: &str) -> DbPool {
        let pool = db::test_pool();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (id, email, username, password_hash) VALUES (?1, ?2, ?3, 'h')",
            params![user_id, format!("{user_id}@example.com"), user_id],
        )
        .unwrap();
        pool
    }

    fn list_for(pool: &DbPool, user_id: &str) -> Vec<String> {
        let conn = pool.get().unwrap();
        let mut stmt = conn
            .prepare("SELECT token FROM refresh_tokens WHERE user_id = ?1 ORDER BY rowid")
            .unwrap();
        stmt.query_map(params![user_id], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn issued_access_token_verifies() {
        let pool = pool_with_user("u1");
        let auth = test_auth();
        let pair = issue_pair(&pool, &auth, "u1").unwrap();
        assert_eq!(verify_access(&auth, &pair.access_token).unwrap(), "u1");
    }

    #[test]
    fn refresh_token_does_not_verify_as_access() {
        let pool = pool_with_user("u1");
        let auth = test_auth();
        let pair = issue_pair(&pool, &auth, "u1").unwrap();
        assert!(matches!(
            verify_access(&auth, &pair.refresh_token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn expired_access_token_rejected() {
        let pool = pool_with_user("u1");
        let mut auth = test_auth();
        auth.access_ttl_minutes = -10;
        let pair = issue_pair(&pool, &auth, "u1").unwrap();
        assert!(matches!(
            verify_access(&auth, &pair.access_token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn garbage_token_rejected() {
        let auth = test_auth();
        assert!(matches!(
            verify_access(&auth, "not-a-jwt"),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn issue_appends_to_list() {
        let pool = pool_with_user("u1");
        let auth = test_auth();
        let p1 = issue_pair(&pool, &auth, "u1").unwrap();
        let p2 = issue_pair(&pool, &auth, "u1").unwrap();
        let list = list_for(&pool, "u1");
        assert_eq!(list, vec![p1.refresh_token, p2.refresh_token]);
    }

    #[test]
    fn stored_expiry_is_in_sqlite_datetime_format() {
        let pool = pool_with_user("u1");
        let auth = test_auth();
        issue_pair(&pool, &auth, "u1").unwrap();

        // datetime() canonicalizes; a format it cannot compare against
        // datetime('now') would not round-trip unchanged
        let conn = pool.get().unwrap();
        let canonical: bool = conn
            .query_row(
                "SELECT expires_at = datetime(expires_at) FROM refresh_tokens WHERE user_id = 'u1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(canonical);
    }

    #[test]
    fn issue_prunes_expired_rows() {
        let pool = pool_with_user("u1");
        let auth = test_auth();
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "INSERT INTO refresh_tokens (user_id, token, expires_at)
                 VALUES ('u1', 'stale', datetime('now', '-1 day'))",
                [],
            )
            .unwrap();
        }
        let pair = issue_pair(&pool, &auth, "u1").unwrap();
        assert_eq!(list_for(&pool, "u1"), vec![pair.refresh_token]);
    }

    #[test]
    fn rotate_swaps_exactly_one_token() {
        let pool = pool_with_user("u1");
        let auth = test_auth();
        let p1 = issue_pair(&pool, &auth, "u1").unwrap();
        let p2 = issue_pair(&pool, &auth, "u1").unwrap();

        let rotated = rotate(&pool, &auth, &p1.refresh_token).unwrap();
        let list = list_for(&pool, "u1");
        assert_eq!(list.len(), 2);
        assert!(!list.contains(&p1.refresh_token));
        assert!(list.contains(&p2.refresh_token));
        assert!(list.contains(&rotated.refresh_token));
        assert_eq!(verify_access(&auth, &rotated.access_token).unwrap(), "u1");
    }

    #[test]
    fn rotate_replay_clears_whole_list() {
        let pool = pool_with_user("u1");
        let auth = test_auth();
        let p1 = issue_pair(&pool, &auth, "u1").unwrap();
        let _p2 = issue_pair(&pool, &auth, "u1").unwrap();

        rotate(&pool, &auth, &p1.refresh_token).unwrap();
        let result = rotate(&pool, &auth, &p1.refresh_token);
        assert!(matches!(result, Err(TokenError::Reuse)));
        assert!(list_for(&pool, "u1").is_empty());
    }

    #[test]
    fn rotate_rejects_tampered_token() {
        let pool = pool_with_user("u1");
        let auth = test_auth();
        let pair = issue_pair(&pool, &auth, "u1").unwrap();
        let mut tampered = pair.refresh_token.clone();
        tampered.push('x');
        assert!(matches!(
            rotate(&pool, &auth, &tampered),
            Err(TokenError::Invalid)
        ));
        // Tampered tokens never touch the stored list
        assert_eq!(list_for(&pool, "u1").len(), 1);
    }

    #[test]
    fn revoke_removes_one_row() {
        let pool = pool_with_user("u1");
        let auth = test_auth();
        let p1 = issue_pair(&pool, &auth, "u1").unwrap();
        let p2 = issue_pair(&pool, &auth, "u1").unwrap();

        assert!(revoke(&pool, &auth, &p1.refresh_token).unwrap());
        assert_eq!(list_for(&pool, "u1"), vec![p2.refresh_token]);
    }

    #[test]
    fn revoke_missing_token_is_not_an_error() {
        let pool = pool_with_user("u1");
        let auth = test_auth();
        let pair = issue_pair(&pool, &auth, "u1").unwrap();
        assert!(revoke(&pool, &auth, &pair.refresh_token).unwrap());
        assert!(!revoke(&pool, &auth, &pair.refresh_token).unwrap());
    }

    #[test]
    fn revoke_rejects_unverifiable_token() {
        let pool = pool_with_user("u1");
        let auth = test_auth();
        assert!(matches!(
            revoke(&pool, &auth, "garbage"),
            Err(TokenError::Invalid)
        ));
    }
}
