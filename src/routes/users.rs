use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::UserView;
use crate::error::{AppError, AppResult};
use crate::extractors::Principal;
use crate::state::AppState;
use crate::users;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/user", post(current_user))
        .route("/users/username", post(username_by_id))
        .route("/users/update_user", post(update_user))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsernameRequest {
    user_id: String,
}

#[derive(Serialize)]
struct UsernameResponse {
    username: String,
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    username: String,
}

/// POST /users/user — the authenticated user's own record
async fn current_user(State(state): State<AppState>, principal: Principal) -> AppResult<Response> {
    let user = users::find_by_id(&state.db, &principal.user_id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok((StatusCode::OK, Json(UserView::from(user))).into_response())
}

/// POST /users/username — resolve a user id to its username
async fn username_by_id(
    State(state): State<AppState>,
    _principal: Principal,
    Json(req): Json<UsernameRequest>,
) -> AppResult<Response> {
    let user = users::find_by_id(&state.db, &req.user_id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok((
        StatusCode::OK,
        Json(UsernameResponse {
            username: user.username,
        }),
    )
        .into_response())
}

/// POST /users/update_user — rename the authenticated user
async fn update_user(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Response> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("No username provided".into()));
    }

    let user = users::update_username(&state.db, &principal.user_id, username)?;
    Ok((StatusCode::OK, Json(UserView::from(user))).into_response())
}
