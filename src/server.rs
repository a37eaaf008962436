use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{OutboundFrame, RelayPayload};
use crate::config::{Config, MalformedPolicy};
use crate::metrics::RelayMetrics;
use crate::protocol::{ClientId, ServerNotice};

mod dispatch;
mod maintenance;
pub mod registry;
pub mod relay;
pub mod sink;

pub use dispatch::DispatchOutcome;
pub use registry::{ClientRegistry, ConnectionHandle, ConnectionState, SendError};
pub use relay::{BroadcastRelay, BroadcastReport};
pub use sink::{ClientFrameStats, MessageSink, SinkStats};

/// Per-message failures. None of them is fatal: each is logged and the
/// server keeps serving.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("payload from {client_id} is not JSON ({size} bytes)")]
    MalformedPayload { client_id: ClientId, size: usize },
    #[error("send to {client_id} failed: {reason}")]
    SendFailure {
        client_id: ClientId,
        reason: SendError,
    },
    #[error("transport closed for {client_id}")]
    TransportClosed { client_id: ClientId },
}

#[derive(Debug, Clone)]
pub struct RelayServerConfig {
    pub malformed_policy: MalformedPolicy,
    pub outbound_queue_capacity: usize,
    pub max_message_size: usize,
    pub max_frame_size: usize,
    /// Disconnect clients silent for longer than this. `Duration::ZERO` disables.
    pub client_timeout: Duration,
    pub cleanup_interval: Duration,
    pub announce_client_id: bool,
    pub require_metrics_auth: bool,
    pub metrics_auth_token: Option<String>,
}

impl Default for RelayServerConfig {
    fn default() -> Self {
        Self {
            malformed_policy: MalformedPolicy::Sink,
            outbound_queue_capacity: 1024,
            max_message_size: 2 * 1024 * 1024, // 2 MiB
            max_frame_size: 16 * 1024 * 1024,
            client_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            announce_client_id: true,
            require_metrics_auth: false,
            metrics_auth_token: None,
        }
    }
}

impl From<&Config> for RelayServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            malformed_policy: config.relay.malformed_policy,
            outbound_queue_capacity: config.relay.outbound_queue_capacity,
            max_message_size: config.websocket.max_message_size,
            max_frame_size: config.websocket.max_frame_size,
            client_timeout: Duration::from_secs(config.relay.client_timeout_secs),
            cleanup_interval: Duration::from_secs(config.relay.cleanup_interval_secs),
            announce_client_id: config.relay.announce_client_id,
            require_metrics_auth: config.security.require_metrics_auth,
            metrics_auth_token: config.security.metrics_auth_token.clone(),
        }
    }
}

/// What the inspection API reports about one live client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub webcam_frames: u64,
    pub fps: f64,
}

/// Connection server: owns the registry and routes every inbound message to
/// the relay or the sink.
pub struct RelayServer {
    config: RelayServerConfig,
    registry: Arc<ClientRegistry>,
    relay: BroadcastRelay,
    sink: MessageSink,
    metrics: Arc<RelayMetrics>,
    shutdown: CancellationToken,
}

impl RelayServer {
    pub fn new(config: RelayServerConfig) -> Arc<Self> {
        let registry = Arc::new(ClientRegistry::new());
        let metrics = Arc::new(RelayMetrics::new());
        let relay = BroadcastRelay::new(registry.clone(), metrics.clone());

        tracing::info!(
            malformed_policy = %config.malformed_policy,
            outbound_queue_capacity = config.outbound_queue_capacity,
            client_timeout_secs = config.client_timeout.as_secs(),
            "Relay server initialized"
        );

        Arc::new(Self {
            config,
            registry,
            relay,
            sink: MessageSink::new(),
            metrics,
            shutdown: CancellationToken::new(),
        })
    }

    /// Register an accepted connection (Connecting -> Open).
    ///
    /// Returns the handle plus the receiving end of its outbound queue, which
    /// the transport drains. When announcing is enabled the first queued frame
    /// is a `connection-established` notice carrying the new id.
    pub fn connect_client(
        &self,
        remote_addr: Option<SocketAddr>,
    ) -> (ConnectionHandle, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(self.config.outbound_queue_capacity.max(1));
        let handle = self.registry.register(tx, remote_addr);
        self.metrics.increment_connections();

        if self.config.announce_client_id {
            let notice = ServerNotice::ConnectionEstablished {
                client_id: handle.id().clone(),
                timestamp: Utc::now(),
            };
            match serde_json::to_string(&notice) {
                Ok(json) => {
                    if let Err(e) = handle.try_send(OutboundFrame::Payload(RelayPayload::text(json)))
                    {
                        tracing::warn!(client_id = %handle.id(), error = %e, "Failed to queue welcome notice");
                    }
                }
                Err(e) => {
                    tracing::error!(client_id = %handle.id(), error = %e, "Failed to serialize welcome notice");
                }
            }
        }

        (handle, rx)
    }

    /// Unregister a connection (-> Closed). Returns false when it was already
    /// gone; calling it again is a no-op.
    pub fn disconnect_client(&self, client_id: &str) -> bool {
        let Some(handle) = self.registry.unregister(client_id) else {
            return false;
        };
        self.sink.forget_client(client_id);
        self.metrics.decrement_active_connections();
        tracing::info!(
            client_id = %handle.id(),
            connected_for_secs = (Utc::now() - handle.connected_at()).num_seconds(),
            "Client disconnected"
        );
        true
    }

    /// Queue a close frame for the client, then unregister it.
    pub fn close_client(&self, client_id: &str, reason: &str) -> bool {
        if let Some(handle) = self.registry.get(client_id) {
            if let Err(error) = handle.try_send(OutboundFrame::Close(reason.to_string())) {
                tracing::debug!(
                    client_id = %handle.id(),
                    reason,
                    %error,
                    "Close frame not queued, socket closes without a reason"
                );
            }
        }
        self.disconnect_client(client_id)
    }

    /// Close every client and stop background tasks.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let ids = self.registry.client_ids();
        tracing::info!(clients = ids.len(), "Relay server shutting down");
        for id in ids {
            self.close_client(&id, "server shutting down");
        }
    }

    pub fn client_info(&self, client_id: &str) -> Option<ClientInfo> {
        let handle = self.registry.get(client_id)?;
        let frames = self.sink.client_frames(client_id);
        let idle = chrono::Duration::from_std(handle.idle_for()).unwrap_or_else(|_| chrono::Duration::zero());
        Some(ClientInfo {
            client_id: handle.id().clone(),
            connected_at: handle.connected_at(),
            last_seen: Utc::now() - idle,
            webcam_frames: frames.webcam_frames,
            fps: frames.fps,
        })
    }

    pub fn config(&self) -> &RelayServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn sink(&self) -> &MessageSink {
        &self.sink
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        self.metrics.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
