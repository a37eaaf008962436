//! Read-only inspection endpoints plus the sink counter reset.

use crate::protocol::ClientId;
use crate::server::{ClientInfo, RelayServer, SinkStats};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use std::sync::Arc;

/// `GET /api/clients`: ids of every live client, sorted.
pub async fn list_clients(State(server): State<Arc<RelayServer>>) -> Json<Vec<ClientId>> {
    Json(server.registry().client_ids())
}

/// `GET /api/clients/{id}`
pub async fn client_detail(
    State(server): State<Arc<RelayServer>>,
    Path(client_id): Path<String>,
) -> Result<Json<ClientInfo>, StatusCode> {
    server
        .client_info(&client_id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// `GET /api/stats`
pub async fn sink_stats(State(server): State<Arc<RelayServer>>) -> Json<SinkStats> {
    Json(server.sink().stats())
}

/// `POST /api/stats/reset`: zero the sink counters and return them.
pub async fn reset_sink_stats(State(server): State<Arc<RelayServer>>) -> Json<SinkStats> {
    server.sink().reset_stats();
    Json(server.sink().stats())
}
