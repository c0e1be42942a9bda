//! Registration, credential and federated login, and the refresh-token
//! lifecycle endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::auth::tokens;
use crate::db::models::UserView;
use crate::error::{AppError, AppResult};
use crate::extractors::Principal;
use crate::state::{AppState, DbPool};
use crate::users;

// -- Request/Response types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_vet: bool,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct GoogleLoginRequest {
    pub credential: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(rename = "_id")]
    pub id: String,
}

// -- Handlers --

/// POST /auth/register — create an account
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    let email = req.email.trim();
    let username = req.username.trim();
    if email.is_empty() {
        return Err(AppError::BadRequest("Email is required".into()));
    }
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".into()));
    }
    if req.password.is_empty() {
        return Err(AppError::BadRequest("Password is required".into()));
    }

    let user = users::create(&state.db, email, username, &req.password, req.is_vet)?;
    Ok((StatusCode::OK, Json(UserView::from(user))).into_response())
}

/// POST /auth/login — exchange credentials for a token pair
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    // Unknown identifier and wrong password look the same to the client
    let user = users::find_by_identifier(&state.db, req.identifier.trim())?
        .ok_or(AppError::Unauthorized)?;
    if !users::verify_password(&user, &req.password)? {
        return Err(AppError::Unauthorized);
    }

    let pair = tokens::issue_pair(&state.db, &state.config.auth, &user.id)?;
    Ok((
        StatusCode::OK,
        Json(SessionResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            id: user.id,
        }),
    )
        .into_response())
}

/// POST /auth/google-login — sign in with a Google ID token, creating the
/// account on first contact
pub async fn google_login(
    State(state): State<AppState>,
    Json(req): Json<GoogleLoginRequest>,
) -> AppResult<Response> {
    let profile = state.google.verify(&req.credential).await?;

    let user = match users::find_by_email(&state.db, &profile.email)? {
        Some(user) => user,
        None => {
            let username = available_username(&state.db, &profile.email)?;
            // The stored password is unguessable; Google stays the only way in
            let password = random_password();
            users::create(&state.db, &profile.email, &username, &password, false)?
        }
    };

    let pair = tokens::issue_pair(&state.db, &state.config.auth, &user.id)?;
    Ok((
        StatusCode::OK,
        Json(SessionResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            id: user.id,
        }),
    )
        .into_response())
}

/// GET /auth/verify-token — report whether the presented access token is valid
pub async fn verify_token(_principal: Principal) -> AppResult<Response> {
    Ok((StatusCode::OK, Json(true)).into_response())
}

/// POST /auth/logout — drop one refresh token; a verifiable token that is
/// already gone still succeeds
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Response> {
    tokens::revoke(&state.db, &state.config.auth, &req.refresh_token)?;
    Ok(StatusCode::OK.into_response())
}

/// POST /auth/refresh — rotate a refresh token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Response> {
    let pair = tokens::rotate(&state.db, &state.config.auth, &req.refresh_token)?;
    Ok((StatusCode::OK, Json(pair)).into_response())
}

// -- Federated account helpers --

/// Derive a username from the email local part, suffixing a counter until it
/// is free.
fn available_username(pool: &DbPool, email: &str) -> AppResult<String> {
    let base = email.split('@').next().unwrap_or_default();
    let base = if base.is_empty() { "user" } else { base };

    if !users::username_exists(pool, base)? {
        return Ok(base.to_string());
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{base}{n}");
        if !users::username_exists(pool, &candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn username_comes_from_email_local_part() {
        let pool = db::test_pool();
        assert_eq!(
            available_username(&pool, "carol@clinic.example").unwrap(),
            "carol"
        );
    }

    #[test]
    fn taken_username_gets_a_numeric_suffix() {
        let pool = db::test_pool();
        users::create(&pool, "a@b.c", "carol", "pw12345678", false).unwrap();
        assert_eq!(
            available_username(&pool, "carol@clinic.example").unwrap(),
            "carol1"
        );

        users::create(&pool, "x@y.z", "carol1", "pw12345678", false).unwrap();
        assert_eq!(
            available_username(&pool, "carol@clinic.example").unwrap(),
            "carol2"
        );
    }

    #[test]
    fn empty_local_part_falls_back() {
        let pool = db::test_pool();
        assert_eq!(available_username(&pool, "@clinic.example").unwrap(), "user");
    }

    #[test]
    fn random_passwords_are_long_and_distinct() {
        let a = random_password();
        let b = random_password();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
