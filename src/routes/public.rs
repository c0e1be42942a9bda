//! The `/public` media tree and the SPA fallback.
//!
//! `public/profile/*` is world-readable; `public/posts/<owner>/*` is served
//! only to the owning principal. Everything that matches no route falls back
//! to the single-page app.

use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::extractors::MaybePrincipal;
use crate::media::guard::{self, Access};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/public/{*path}", get(serve_public))
}

/// GET /public/* — guarded static file serving out of the media root
async fn serve_public(
    State(state): State<AppState>,
    maybe: MaybePrincipal,
    Path(path): Path<String>,
) -> AppResult<Response> {
    let principal = maybe.0.as_ref().map(|p| p.user_id.as_str());
    if guard::check(&path, principal) == Access::Denied {
        return Err(AppError::Forbidden("Access denied".into()));
    }

    serve_file(state.media.root().join(&path)).await
}

/// GET fallback for everything outside the API: serve the requested SPA
/// asset if it exists, otherwise the app shell. Other methods are a 404.
pub async fn spa_fallback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> AppResult<Response> {
    if method != Method::GET {
        return Err(AppError::NotFound("Not found".into()));
    }

    let path = uri.path().trim_start_matches('/');

    if !path.is_empty() && !path.split('/').any(|c| c == "..") {
        let candidate = state.config.spa_dir().join(path);
        if candidate.is_file() {
            return serve_file(candidate).await;
        }
    }

    serve_file(state.config.spa_dir().join("index.html")).await
}

async fn serve_file(path: PathBuf) -> AppResult<Response> {
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => return Err(AppError::NotFound("File not found".into())),
    };
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        bytes,
    )
        .into_response())
}
