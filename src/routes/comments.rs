use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::comments;
use crate::error::{AppError, AppResult};
use crate::extractors::Principal;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comments", post(create_comment))
        .route(
            "/comments/{id}",
            get(comments_for_post).delete(delete_comment),
        )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCommentRequest {
    post_id: String,
    comment: String,
}

/// GET /comments/:postId — comments on a post, oldest first
async fn comments_for_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let comments = comments::list_by_post(&state.db, &post_id)?;
    Ok((StatusCode::OK, Json(comments)).into_response())
}

/// POST /comments — comment on a post as the caller
async fn create_comment(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Response> {
    let text = req.comment.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Comment is required".into()));
    }

    let comment = comments::create(&state.db, &req.post_id, &principal.user_id, text)?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

/// DELETE /comments/:id — author-only
async fn delete_comment(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> AppResult<Response> {
    comments::delete(&state.db, &id, &principal.user_id)?;
    Ok(StatusCode::OK.into_response())
}
