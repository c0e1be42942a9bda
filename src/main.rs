use std::net::SocketAddr;

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vetigram::config::{Cli, Config};
use vetigram::state::AppState;
use vetigram::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure the media tree exists
    std::fs::create_dir_all(config.media_root().join("posts"))?;
    std::fs::create_dir_all(config.media_root().join("profile"))?;

    // Initialize database
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    // Build app state and router
    let state = AppState::new(config.clone(), pool);
    let app = routes::build_router(state);

    // Start server; production terminates TLS itself
    if config.server.production {
        let addr: SocketAddr =
            format!("{}:{}", config.server.host, config.server.https_port).parse()?;
        let tls = RustlsConfig::from_pem_file(&config.tls.cert_file, &config.tls.key_file).await?;
        tracing::info!("Listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
    } else {
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        tracing::info!("Listening on http://{}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}
