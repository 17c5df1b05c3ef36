use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genrelay_api::config::ServerConfig;
use genrelay_api::router::build_app_router;
use genrelay_api::state::AppState;
use genrelay_api::background;
use genrelay_core::catalog::ModelCatalog;
use genrelay_core::provider::{StaticTokenSource, TokenSource};
use genrelay_vertex::{OAuthCredentials, OAuthTokenSource, VertexClient, VertexConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "genrelay_api=debug,genrelay_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    tokio::fs::create_dir_all(&config.media_dir)
        .await
        .expect("Failed to create media directory");
    tracing::info!(media_dir = %config.media_dir.display(), "Media directory ready");

    // --- Provider ---
    let vertex_config = VertexConfig::from_env();
    tracing::info!(
        project_id = %vertex_config.project_id,
        location = %vertex_config.location,
        base_url = %vertex_config.api_base(),
        "Loaded Vertex AI configuration"
    );
    let provider = Arc::new(VertexClient::new(vertex_config));
    let tokens = build_token_source();

    // --- App state ---
    let state = AppState::new(config.clone(), ModelCatalog::builtin(), provider, tokens);

    // --- Media retention ---
    let retention_cancel = CancellationToken::new();
    let retention_handle = tokio::spawn(background::media_retention::run(
        Arc::clone(&state.store),
        Arc::clone(&state.materializer),
        config
            .media_retention()
            .expect("MEDIA_RETENTION_HOURS is validated when the config loads"),
        Duration::from_secs(config.media_cleanup_interval_secs.max(1)),
        retention_cancel.clone(),
    ));

    let supervisor = Arc::clone(&state.supervisor);

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Pollers first: each records a terminal state for its job.
    supervisor.shutdown(config.shutdown_timeout()).await;

    retention_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Media retention job stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Pick the provider credential source.
///
/// `GOOGLE_ACCESS_TOKEN` pins a fixed token; otherwise OAuth refresh-token
/// credentials are required.
fn build_token_source() -> Arc<dyn TokenSource> {
    if let Some(token) = std::env::var("GOOGLE_ACCESS_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
    {
        tracing::info!("Using static access token from GOOGLE_ACCESS_TOKEN");
        return Arc::new(StaticTokenSource::new(token));
    }

    let credentials = OAuthCredentials::from_env().expect("Failed to load OAuth credentials");
    tracing::info!(?credentials, "Using OAuth refresh-token credentials");
    Arc::new(OAuthTokenSource::new(credentials))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
