//! Gallery Backend Server
//!
//! Serves the wallet authentication API backed by PostgreSQL and an
//! Ethereum JSON-RPC endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{routing::get, Router};
use sqlx::PgPool;
use tokio::signal;

use gallery_backend::auth::{AuthChallengeService, LoginAttemptRecorder, SessionIssuer};
use gallery_backend::chain::AlloyChainClient;
use gallery_backend::config::Config;
use gallery_backend::persist::{PgLoginAttemptRepository, PgNonceRepository, PgUserRepository};
use gallery_backend::state::AppState;
use gallery_backend::{build_router, db};

/// Upper bound on flushing queued login attempts at shutdown
const AUDIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting gallery backend");

    let db_pool = db::connect(&config).await?;

    let chain = AlloyChainClient::connect(&config.eth_rpc_url)?;
    tracing::info!(rpc_url = %config.eth_rpc_url, "Chain client configured");

    let (recorder, audit_worker) = LoginAttemptRecorder::spawn(
        Arc::new(PgLoginAttemptRepository::new(db_pool.clone())),
        config.login_attempt_queue_size,
    );

    let auth_service = Arc::new(AuthChallengeService::new(
        Arc::new(PgUserRepository::new(db_pool.clone())),
        Arc::new(PgNonceRepository::new(db_pool.clone())),
        Arc::new(chain),
        SessionIssuer::new(config.jwt_secret.clone(), config.jwt_ttl_seconds),
        recorder,
        config.auth_settings(),
    ));

    let app_state = AppState::new(auth_service);

    let health_db_pool = db_pool.clone();
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(move || health_check(health_db_pool.clone())))
        .merge(build_router(app_state, config.request_timeout()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Serve with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    // The router owned every recorder handle, so the audit channel is closed
    if tokio::time::timeout(AUDIT_DRAIN_TIMEOUT, audit_worker.shutdown())
        .await
        .is_err()
    {
        tracing::warn!("Timed out draining login attempts");
    }

    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    Ok(())
}

async fn root() -> &'static str {
    "Gallery API Server"
}

/// Health check response
#[derive(serde::Serialize)]
struct HealthResponse {
    status: String,
    database: String,
    version: String,
}

/// Health check endpoint
async fn health_check(pool: PgPool) -> axum::Json<HealthResponse> {
    let (status, database) = match db::check_health(&pool).await {
        Ok(()) => ("healthy", "connected".to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            ("unhealthy", "unavailable".to_string())
        }
    };

    axum::Json(HealthResponse {
        status: status.to_string(),
        database,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
