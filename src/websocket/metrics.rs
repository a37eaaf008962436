use crate::metrics::MetricsSnapshot;
use crate::server::{RelayServer, SinkStats};
use axum::extract::State;
use axum::http::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::prometheus::render_prometheus_metrics;

fn enforce_metrics_auth(headers: &HeaderMap, server: &RelayServer) -> Result<(), StatusCode> {
    let Some(raw_header) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        tracing::warn!("Unauthorized metrics access attempt: missing Authorization header");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let Some(token) = raw_header.strip_prefix("Bearer ") else {
        tracing::warn!("Unauthorized metrics access attempt: invalid Authorization scheme");
        return Err(StatusCode::UNAUTHORIZED);
    };

    if let Some(expected) = server.config().metrics_auth_token.as_deref() {
        if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
            tracing::debug!("Metrics access authorized via bearer token");
            return Ok(());
        }
    }

    tracing::warn!("Unauthorized metrics access attempt: token rejected");
    Err(StatusCode::UNAUTHORIZED)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub live_clients: usize,
    pub sink: SinkStats,
    pub server_metrics: MetricsSnapshot,
}

/// JSON metrics endpoint.
pub async fn metrics_handler(
    headers: HeaderMap,
    State(server): State<Arc<RelayServer>>,
) -> Result<Json<MetricsResponse>, StatusCode> {
    if server.config().require_metrics_auth {
        enforce_metrics_auth(&headers, &server)?;
    }

    Ok(Json(MetricsResponse {
        live_clients: server.registry().len(),
        sink: server.sink().stats(),
        server_metrics: server.metrics().snapshot(),
    }))
}

/// Prometheus metrics endpoint (text format, version 0.0.4)
pub async fn prometheus_metrics_handler(
    headers: HeaderMap,
    State(server): State<Arc<RelayServer>>,
) -> Result<Response, StatusCode> {
    if server.config().require_metrics_auth {
        enforce_metrics_auth(&headers, &server)?;
    }

    let body = render_prometheus_metrics(&server.metrics().snapshot(), server.registry().len());
    let headers = [(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    )];

    Ok((headers, body).into_response())
}
