use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::tokens;
use crate::error::AppError;
use crate::state::AppState;

/// The verified user id attached to an admitted request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
}

/// Extractor that requires a valid access token.
/// Verification is signature + expiry only; no database read.
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let user_id =
            tokens::verify_access(&state.config.auth, token).map_err(|_| AppError::Unauthorized)?;
        Ok(Principal { user_id })
    }
}

/// Optional principal — returns None instead of 401 when the request carries
/// no usable token. Used by the guarded static tree, where anonymous reads of
/// the profile namespace are allowed.
pub struct MaybePrincipal(pub Option<Principal>);

impl FromRequestParts<AppState> for MaybePrincipal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match Principal::from_request_parts(parts, state).await {
            Ok(principal) => Ok(MaybePrincipal(Some(principal))),
            Err(_) => Ok(MaybePrincipal(None)),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(token_from_header)
}

// Clients send "Bearer <token>"; older ones send "JWT <token>". The scheme
// word is not inspected, only the second field matters.
fn token_from_header(value: &str) -> Option<&str> {
    value.split_whitespace().nth(1)
}
