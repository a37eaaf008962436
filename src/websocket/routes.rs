use crate::server::RelayServer;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::api::{client_detail, list_clients, reset_sink_stats, sink_stats};
use super::handler::websocket_handler;
use super::metrics::{metrics_handler, prometheus_metrics_handler};

/// Build the HTTP router: the WebSocket upgrade, health, metrics and the
/// inspection API.
pub fn create_router(cors_origins: &str) -> Router<Arc<RelayServer>> {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/metrics/prom", get(prometheus_metrics_handler))
        .route("/api/clients", get(list_clients))
        .route("/api/clients/{id}", get(client_detail))
        .route("/api/stats", get(sink_stats))
        .route("/api/stats/reset", post(reset_sink_stats))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(cors_origins: &str) -> CorsLayer {
    if cors_origins.trim() == "*" {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = cors_origins
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("No valid CORS origins configured, using permissive CORS");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn health_check() -> &'static str {
    "OK"
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// Connection info is attached so the WebSocket handler can log peer
/// addresses.
pub async fn serve<F>(
    listener: TcpListener,
    server: Arc<RelayServer>,
    cors_origins: &str,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(cors_origins).with_state(server);
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "Signal relay listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}
