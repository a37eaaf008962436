use crate::broadcast::RelayPayload;
use crate::server::{RelayError, RelayServer};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use super::sending::{close_message, write_frame, WriteState};

/// Time the writer gets to flush a pending close frame after the reader ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub(super) async fn handle_socket(socket: WebSocket, server: Arc<RelayServer>, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();
    let (handle, mut rx) = server.connect_client(Some(addr));
    let client_id = handle.id().clone();
    tracing::info!(%client_id, client_addr = %addr, "WebSocket connection established");

    // Writer: drain the outbound queue until it closes or the client is
    // unregistered elsewhere (idle reaper, shutdown)
    let writer_handle = handle.clone();
    let writer_server = server.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    match write_frame(&mut sender, frame).await {
                        Ok(WriteState::Open) => {}
                        Ok(WriteState::Closing) => break,
                        Err(error) => {
                            writer_server.metrics().increment_websocket_errors();
                            tracing::debug!(client_id = %writer_handle.id(), %error, "WebSocket write failed");
                            break;
                        }
                    }
                }
                () = writer_handle.closed() => {
                    let _ = sender.send(close_message("connection closed")).await;
                    break;
                }
            }
        }
    });

    // Reader: feed every data frame to the dispatcher, one at a time
    let reader_handle = handle.clone();
    let reader_server = server.clone();
    let mut receive_task = tokio::spawn(async move {
        let client_id = reader_handle.id();
        let max_size = reader_server.config().max_message_size;

        while let Some(message) = receiver.next().await {
            let message = match message {
                Ok(message) => message,
                Err(error) => {
                    reader_server.metrics().increment_websocket_errors();
                    tracing::warn!(%client_id, %error, "WebSocket error");
                    break;
                }
            };

            let payload = match message {
                Message::Text(text) => RelayPayload::Text(text),
                Message::Binary(bytes) => RelayPayload::binary(bytes),
                Message::Close(frame) => {
                    tracing::debug!(%client_id, ?frame, "Client sent close frame");
                    break;
                }
                // Pongs are answered by the transport; keepalives count as activity
                Message::Ping(_) | Message::Pong(_) => {
                    reader_handle.touch();
                    continue;
                }
            };

            if payload.len() > max_size {
                reader_server.metrics().increment_oversized_messages();
                tracing::warn!(
                    %client_id,
                    size = payload.len(),
                    max = max_size,
                    "Message exceeds size limit, dropped"
                );
                continue;
            }

            reader_server.handle_inbound(client_id, payload);
        }
    });

    let writer_finished = tokio::select! {
        _ = &mut send_task => true,
        _ = &mut receive_task => false,
    };
    if writer_finished {
        receive_task.abort();
    }

    if server.disconnect_client(&client_id) {
        let reason = RelayError::TransportClosed {
            client_id: client_id.clone(),
        };
        tracing::info!(client_addr = %addr, %reason, "WebSocket connection closed");
    }

    if !writer_finished && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut send_task).await.is_err() {
        send_task.abort();
    }
}
