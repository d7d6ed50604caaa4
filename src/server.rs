//! Gateway server initialization and lifecycle management.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::routes::create_router;
use crate::service::NeonService;

/// Builds the application with request tracing installed.
pub fn build_app(service: NeonService) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Starts the gateway server and serves until SIGINT/SIGTERM.
///
/// `listen_addr` overrides the configured address when set.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built, the listener
/// cannot bind, or the server fails while running.
pub async fn run(config: Config, listen_addr: Option<SocketAddr>) -> anyhow::Result<()> {
    let service = NeonService::from_config(&config)?;
    info!(
        api_url = %config.api_url,
        local = config.local,
        "Neon API client ready"
    );

    let addr = listen_addr.unwrap_or(config.listen_addr);
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, build_app(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
