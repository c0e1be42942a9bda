use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::Principal;
use crate::likes;
use crate::posts;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", put(update_post).delete(delete_post))
        .route("/posts/likes/status", post(like_status))
        .route("/posts/likes/likeUpdate", post(like_update))
}

#[derive(Deserialize)]
struct ListQuery {
    owner: Option<String>,
}

#[derive(Deserialize)]
struct CreatePostRequest {
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct UpdatePostRequest {
    title: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikeStatusRequest {
    post_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikeUpdateRequest {
    post_id: String,
    new_like_status: bool,
}

/// GET /posts — the feed, optionally filtered to one owner
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    let posts = posts::list(&state.db, query.owner.as_deref())?;
    Ok((StatusCode::OK, Json(posts)).into_response())
}

/// POST /posts — create a post owned by the caller
async fn create_post(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Response> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title is required".into()));
    }

    let post = posts::create(&state.db, &principal.user_id, title, &req.content)?;
    Ok((StatusCode::CREATED, Json(post)).into_response())
}

/// PUT /posts/:id — owner-only edit; absent fields keep their value
async fn update_post(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<Response> {
    let post = posts::update(
        &state.db,
        &id,
        &principal.user_id,
        req.title.as_deref(),
        req.content.as_deref(),
    )?;
    Ok((StatusCode::OK, Json(post)).into_response())
}

/// DELETE /posts/:id — owner-only; the attached image is unlinked best-effort
async fn delete_post(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post = posts::delete(&state.db, &id, &principal.user_id)?;
    state
        .media
        .remove_post_image(&post.user_id, &post.image_name)
        .await;
    Ok(StatusCode::OK.into_response())
}

/// POST /posts/likes/status — the caller's like state for a post
async fn like_status(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<LikeStatusRequest>,
) -> AppResult<Response> {
    let status = likes::status(&state.db, &req.post_id, &principal.user_id)?;
    Ok((StatusCode::OK, Json(status)).into_response())
}

/// POST /posts/likes/likeUpdate — set the caller's like state for a post
async fn like_update(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<LikeUpdateRequest>,
) -> AppResult<Response> {
    let status = likes::set(
        &state.db,
        &req.post_id,
        &principal.user_id,
        req.new_like_status,
    )?;
    Ok((StatusCode::OK, Json(status)).into_response())
}
