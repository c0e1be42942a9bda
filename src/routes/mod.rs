pub mod ai;
pub mod auth;
pub mod comments;
pub mod files;
pub mod posts;
pub mod public;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full HTTP surface: the API routers, the guarded media tree
/// and the SPA fallback, wrapped in trace, CORS and body-limit layers.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.limits.upload_limit_bytes;

    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(posts::router())
        .merge(comments::router())
        .merge(files::router())
        .merge(ai::router(state.clone()))
        .merge(public::router())
        .fallback(public::spa_fallback)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
