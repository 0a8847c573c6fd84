mod config;

use std::net::SocketAddr;

use tracing::{info, warn};

use keepsake_api::speech::SpeechEngine;
use keepsake_api::tokens::TokenService;
use keepsake_api::{AppStateInner, build_router};
use keepsake_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "keepsake=debug,keepsake_api=debug,keepsake_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and storage
    let db = Database::open(&config.db_path)?;
    let tokens = TokenService::new(
        &config.secret_key,
        config.jwt_algorithm,
        chrono::Duration::minutes(config.token_ttl_minutes),
    );
    let speech = SpeechEngine::from_api_key(&config.speech_base_url, config.openai_api_key.clone());
    if matches!(speech, SpeechEngine::Disabled) {
        warn!("OPENAI_API_KEY not set; speech endpoints will answer 503");
    }

    let state = AppStateInner::build(
        db,
        tokens,
        speech,
        config.static_dir.clone(),
        config.max_upload_bytes,
    )
    .await?;

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Keepsake server listening on {}", addr);
    info!("Token lifetime: {} minutes", config.token_ttl_minutes);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
