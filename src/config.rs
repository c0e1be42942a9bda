use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vetigram", about = "Backend for the Vetigram veterinary feed")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub auth: AuthConfig,
    pub ai: AiConfig,
    pub limits: LimitsConfig,
    pub tls: TlsConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub https_port: u16,
    pub production: bool,
    pub domain_base: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct MediaConfig {
    pub root: Option<PathBuf>,
    pub spa_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub google_client_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AiConfig {
    pub openai_api_key: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub upload_limit_bytes: usize,
    pub ai_per_minute: u32,
    pub ai_per_hour: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TlsConfig {
    pub key_file: PathBuf,
    pub cert_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            https_port: 4002,
            production: false,
            domain_base: "http://localhost".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: String::new(),
            refresh_token_secret: String::new(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 30,
            google_client_id: None,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            upload_limit_bytes: 10 * 1024 * 1024,
            ai_per_minute: 60,
            ai_per_hour: 30,
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            key_file: PathBuf::from("src/certs/client-key.pem"),
            cert_file: PathBuf::from("src/certs/client-cert.pem"),
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("vetigram.db"));
        }
        if config.media.root.is_none() {
            config.media.root = Some(data_dir.join("public"));
        }
        if config.media.spa_dir.is_none() {
            config.media.spa_dir = Some(PathBuf::from("front"));
        }

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(port) = env_parse::<u16>("PORT") {
            self.server.port = port;
        }
        if let Some(port) = env_parse::<u16>("HTTPS_PORT") {
            self.server.https_port = port;
        }
        if let Ok(env) = std::env::var("NODE_ENV") {
            self.server.production = env == "production";
        }
        if let Ok(base) = std::env::var("DOMAIN_BASE") {
            self.server.domain_base = base;
        }
        if let Ok(path) = std::env::var("DB_CONNECT") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Ok(secret) = std::env::var("ACCESS_TOKEN_SECRET") {
            self.auth.access_token_secret = secret;
        }
        if let Ok(secret) = std::env::var("REFRESH_TOKEN_SECRET") {
            self.auth.refresh_token_secret = secret;
        }
        if let Some(minutes) = env_parse::<i64>("ACCESS_TOKEN_TTL_MINUTES") {
            self.auth.access_ttl_minutes = minutes;
        }
        if let Some(days) = env_parse::<i64>("REFRESH_TOKEN_TTL_DAYS") {
            self.auth.refresh_ttl_days = days;
        }
        if let Ok(id) = std::env::var("GOOGLE_CLIENT_ID") {
            self.auth.google_client_id = Some(id);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.ai.openai_api_key = Some(key);
        }
        if let Ok(path) = std::env::var("TLS_KEY_FILE") {
            self.tls.key_file = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("TLS_CERT_FILE") {
            self.tls.cert_file = PathBuf::from(path);
        }
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .expect("Could not determine home directory")
                .join(".vetigram")
        })
    }

    pub fn db_path(&self) -> &PathBuf {
        self.database.path.as_ref().unwrap()
    }

    pub fn media_root(&self) -> &PathBuf {
        self.media.root.as_ref().unwrap()
    }

    pub fn spa_dir(&self) -> &PathBuf {
        self.media.spa_dir.as_ref().unwrap()
    }

    /// Base for absolute media URLs, e.g. `http://localhost:4000`.
    pub fn public_base(&self) -> String {
        let port = if self.server.production {
            self.server.https_port
        } else {
            self.server.port
        };
        format!("{}:{}", self.server.domain_base, port)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
