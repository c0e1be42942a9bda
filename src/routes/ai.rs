use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::Principal;
use crate::ratelimit;
use crate::state::AppState;

/// The `/ai_data` namespace sits behind the per-minute limiter; the
/// suggestion endpoint adds its own hourly limiter on top.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/ai_data/suggest-post-content", post(suggest_post_content))
        .route_layer(from_fn_with_state(
            state.clone(),
            ratelimit::suggest_rate_limit,
        ))
        .layer(from_fn_with_state(state, ratelimit::ai_rate_limit))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestRequest {
    image_base64: Option<String>,
    image_media_type: Option<String>,
}

/// POST /ai_data/suggest-post-content — title and content suggestions for an
/// uploaded image
async fn suggest_post_content(
    State(state): State<AppState>,
    _principal: Principal,
    Json(req): Json<SuggestRequest>,
) -> AppResult<Response> {
    let image_base64 = req
        .image_base64
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Image base64 is required".into()))?;
    let media_type = req
        .image_media_type
        .unwrap_or_else(|| "image/jpeg".to_string());

    let suggestion = state.ai.suggest(&image_base64, &media_type).await?;
    Ok((StatusCode::OK, Json(suggestion)).into_response())
}
