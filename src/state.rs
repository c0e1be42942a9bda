use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::ai::AiClient;
use crate::auth::google::GoogleVerifier;
use crate::config::Config;
use crate::media::MediaStore;
use crate::ratelimit::RateLimiter;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub media: MediaStore,
    pub ai: AiClient,
    pub google: GoogleVerifier,
    pub ai_limiter: Arc<Mutex<RateLimiter>>,
    pub suggest_limiter: Arc<Mutex<RateLimiter>>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let media = MediaStore::new(config.media_root().clone(), config.public_base());
        let ai = AiClient::new(config.ai.openai_api_key.clone());
        let google = GoogleVerifier::new(config.auth.google_client_id.clone());
        let ai_limiter = Arc::new(Mutex::new(RateLimiter::new(
            config.limits.ai_per_minute,
            Duration::from_secs(60),
        )));
        let suggest_limiter = Arc::new(Mutex::new(RateLimiter::new(
            config.limits.ai_per_hour,
            Duration::from_secs(60 * 60),
        )));
        Self {
            db,
            config,
            media,
            ai,
            google,
            ai_limiter,
            suggest_limiter,
        }
    }
}
