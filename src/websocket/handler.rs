use crate::server::RelayServer;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;

use super::connection::handle_socket;

/// Upgrade `GET /ws` to a relay connection.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(server): State<Arc<RelayServer>>,
) -> Response {
    let transport_limit = server.config().max_frame_size;
    ws.max_message_size(transport_limit)
        .max_frame_size(transport_limit)
        .on_failed_upgrade(move |error| {
            tracing::warn!(client_addr = %addr, %error, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| handle_socket(socket, server, addr))
}
