mod config;
mod db;
mod guard;
mod routes;
mod services;
mod state;
mod types;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, ConfigError, Environment, SessionBackend};
use crate::services::identity::{GoogleOAuth, GoogleTokenVerifier};
use crate::services::session::{MemorySessionStore, PgSessionStore, SessionStore, spawn_session_sweeper};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database init failed: {0}")]
    Db(#[from] sqlx::Error),
    #[error("http client init failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        environment = config.environment.as_str(),
        app_url = %config.app_url,
        api_url = %config.api_url,
        db_host = %config.database.host,
        db_port = config.database.port,
        db_name = %config.database.database,
        db_user = %config.database.user,
        db_password_set = !config.database.password.is_empty(),
        cache_host = %config.cache.host,
        cache_port = config.cache.port,
        cache_password_set = config.cache.password.is_some(),
        "configuration loaded"
    );

    let sessions: Arc<dyn SessionStore> = match config.session_backend {
        SessionBackend::Postgres => {
            let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
            Arc::new(PgSessionStore::new(pool, config.api_secret_key.clone()))
        }
        SessionBackend::Memory => {
            if config.environment == Environment::Production {
                tracing::warn!("in-memory sessions in production; sessions are lost on restart");
            }
            Arc::new(MemorySessionStore::new(config.api_secret_key.clone()))
        }
    };
    let _sweeper = spawn_session_sweeper(sessions.clone(), config.session_sweep_interval);

    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let verifier = Arc::new(GoogleTokenVerifier::new(http.clone(), vec![config.google.client_id.clone()]));
    let oauth = GoogleOAuth::new(
        http,
        config.google.client_id.clone(),
        config.google.client_secret.clone(),
        config.google.redirect_uri.clone(),
    );

    let port = config.port;
    let state = state::AppState::new(config, sessions, verifier, oauth);
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(%port, "calendar-shell listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
