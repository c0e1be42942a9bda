use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::extractors::Principal;
use crate::posts;
use crate::state::AppState;
use crate::users;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/files/posts", post(upload_post_image))
        .route("/files/profile", post(upload_profile_image))
}

#[derive(Serialize)]
struct UploadResponse {
    url: String,
}

struct UploadedFile {
    original_name: String,
    bytes: Bytes,
}

/// POST /files/posts — attach an image to one of the caller's posts
async fn upload_post_image(
    State(state): State<AppState>,
    principal: Principal,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let (file, post_id) = read_multipart(&mut multipart).await?;
    let file = file.ok_or_else(|| AppError::BadRequest("No file uploaded".into()))?;
    let post_id = post_id.ok_or_else(|| AppError::BadRequest("No postId provided".into()))?;

    let post = posts::find(&state.db, &post_id)?
        .ok_or_else(|| AppError::NotFound("Post not found".into()))?;
    if post.user_id != principal.user_id {
        return Err(AppError::Forbidden("Not the post owner".into()));
    }

    let filename = state
        .media
        .save_post_image(&principal.user_id, &file.original_name, file.bytes)
        .await?;
    posts::set_image_name(&state.db, &post_id, &filename)?;

    // Replacement unlinks the previous file
    if post.image_name != filename {
        state
            .media
            .remove_post_image(&post.user_id, &post.image_name)
            .await;
    }

    let url = state.media.post_image_url(&principal.user_id, &filename);
    Ok((StatusCode::OK, Json(UploadResponse { url })).into_response())
}

/// POST /files/profile — replace the caller's profile image
async fn upload_profile_image(
    State(state): State<AppState>,
    principal: Principal,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let (file, _) = read_multipart(&mut multipart).await?;
    let file = file.ok_or_else(|| AppError::BadRequest("No file uploaded".into()))?;

    let filename = state
        .media
        .save_profile_image(&principal.user_id, &file.original_name, file.bytes)
        .await?;
    users::set_profile_image_name(&state.db, &principal.user_id, &filename)?;

    let url = state.media.profile_image_url(&filename);
    Ok((StatusCode::OK, Json(UploadResponse { url })).into_response())
}

/// Pull the `file` field and the optional `postId` field out of a multipart
/// body, tolerating any field order.
async fn read_multipart(
    multipart: &mut Multipart,
) -> AppResult<(Option<UploadedFile>, Option<String>)> {
    let mut file = None;
    let mut post_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::BadRequest("Malformed multipart body".into()))?
    {
        match field.name() {
            Some("file") => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::BadRequest("Malformed multipart body".into()))?;
                file = Some(UploadedFile {
                    original_name,
                    bytes,
                });
            }
            Some("postId") => {
                post_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| AppError::BadRequest("Malformed multipart body".into()))?,
                );
            }
            _ => {}
        }
    }

    Ok((file, post_id))
}
