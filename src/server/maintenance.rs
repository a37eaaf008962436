use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::RelayServer;

/// Lower bound on the sweep period; a zero interval would spin.
const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(10);

impl RelayServer {
    /// Periodically close clients that have gone quiet.
    ///
    /// Returns immediately when idle reaping is disabled, otherwise runs until
    /// the shutdown token is cancelled.
    pub async fn cleanup_task(&self) {
        if self.config.client_timeout.is_zero() {
            tracing::info!("Idle-client reaping disabled");
            return;
        }

        let period = self.config.cleanup_interval.max(MIN_CLEANUP_INTERVAL);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    tracing::debug!("Cleanup task stopped");
                    break;
                }
                _ = interval.tick() => {
                    let reaped = self.reap_idle_clients();
                    if reaped > 0 {
                        tracing::info!(
                            reaped,
                            remaining = self.registry.len(),
                            "Closed idle clients"
                        );
                    }
                }
            }
        }
    }

    /// Close every client with no inbound activity for longer than the
    /// configured timeout. Returns how many were closed.
    pub fn reap_idle_clients(&self) -> usize {
        if self.config.client_timeout.is_zero() {
            return 0;
        }

        let idle = self.registry.idle_clients(self.config.client_timeout);
        for client_id in &idle {
            tracing::info!(%client_id, timeout_secs = self.config.client_timeout.as_secs(), "Removing idle client");
            self.metrics.increment_idle_disconnects();
            self.close_client(client_id, "idle timeout");
        }
        idle.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::broadcast::{OutboundFrame, RelayPayload};
    use crate::server::{RelayServer, RelayServerConfig};
    use std::time::Duration;

    fn server(timeout: Duration, interval: Duration) -> std::sync::Arc<RelayServer> {
        RelayServer::new(RelayServerConfig {
            client_timeout: timeout,
            cleanup_interval: interval,
            announce_client_id: false,
            ..RelayServerConfig::default()
        })
    }

    #[tokio::test]
    async fn reap_closes_only_silent_clients() {
        let server = server(Duration::from_millis(50), Duration::from_secs(60));
        let (quiet, mut quiet_rx) = server.connect_client(None);
        let (chatty, _chatty_rx) = server.connect_client(None);

        tokio::time::sleep(Duration::from_millis(80)).await;
        server.handle_inbound(chatty.id(), RelayPayload::text(r#"{"type":"ping"}"#));

        assert_eq!(server.reap_idle_clients(), 1);
        assert!(!server.registry().contains(quiet.id()));
        assert!(server.registry().contains(chatty.id()));
        assert_eq!(
            quiet_rx.try_recv().unwrap(),
            OutboundFrame::Close("idle timeout".to_string())
        );
        assert_eq!(server.metrics().snapshot().connections.idle_disconnects, 1);
    }

    #[tokio::test]
    async fn zero_timeout_disables_reaping() {
        let server = server(Duration::ZERO, Duration::from_millis(10));
        let (_handle, _rx) = server.connect_client(None);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(server.reap_idle_clients(), 0);

        // Returns right away instead of looping
        tokio::time::timeout(Duration::from_secs(1), server.cleanup_task())
            .await
            .unwrap();
        assert_eq!(server.registry().len(), 1);
    }

    #[tokio::test]
    async fn cleanup_task_reaps_and_stops_on_shutdown() {
        let server = server(Duration::from_millis(30), Duration::from_millis(10));
        let (_handle, _rx) = server.connect_client(None);

        let task = tokio::spawn({
            let server = server.clone();
            async move { server.cleanup_task().await }
        });

        tokio::time::timeout(Duration::from_secs(2), async {
            while !server.registry().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        server.shutdown_token().cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
