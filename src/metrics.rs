use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime counters for the relay.
///
/// All counters are relaxed atomics: they are observability data, not
/// synchronization points.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    // Connection metrics
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub idle_disconnects: AtomicU64,
    pub websocket_errors: AtomicU64,

    // Inbound traffic
    pub messages_received: AtomicU64,
    pub signaling_messages: AtomicU64,
    pub generic_messages: AtomicU64,
    pub data_channel_messages: AtomicU64,
    pub malformed_messages: AtomicU64,
    pub oversized_messages: AtomicU64,

    // Fan-out
    pub broadcasts: AtomicU64,
    pub deliveries: AtomicU64,
    pub skipped_closed_recipients: AtomicU64,
    pub send_failures: AtomicU64,
}

/// Point-in-time copy of [`RelayMetrics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub connections: ConnectionMetrics,
    pub traffic: TrafficMetrics,
    pub fanout: FanoutMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub idle_disconnects: u64,
    pub websocket_errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficMetrics {
    pub messages_received: u64,
    pub signaling_messages: u64,
    pub generic_messages: u64,
    pub data_channel_messages: u64,
    pub malformed_messages: u64,
    pub oversized_messages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutMetrics {
    pub broadcasts: u64,
    pub deliveries: u64,
    pub skipped_closed_recipients: u64,
    pub send_failures: u64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // Connection metrics
    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        // Check-then-decrement so a stray double close cannot underflow
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(1)
            });
        self.disconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_idle_disconnects(&self) {
        self.idle_disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_websocket_errors(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    // Inbound traffic
    pub fn increment_messages_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_signaling_messages(&self) {
        self.signaling_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_generic_messages(&self) {
        self.generic_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_data_channel_messages(&self) {
        self.data_channel_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_malformed_messages(&self) {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_oversized_messages(&self) {
        self.oversized_messages.fetch_add(1, Ordering::Relaxed);
    }

    // Fan-out
    pub fn record_broadcast(&self, delivered: u64, skipped_closed: u64, failed: u64) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered, Ordering::Relaxed);
        self.skipped_closed_recipients
            .fetch_add(skipped_closed, Ordering::Relaxed);
        self.send_failures.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            connections: ConnectionMetrics {
                total_connections: self.total_connections.load(Ordering::Relaxed),
                active_connections: self.active_connections.load(Ordering::Relaxed),
                disconnections: self.disconnections.load(Ordering::Relaxed),
                idle_disconnects: self.idle_disconnects.load(Ordering::Relaxed),
                websocket_errors: self.websocket_errors.load(Ordering::Relaxed),
            },
            traffic: TrafficMetrics {
                messages_received: self.messages_received.load(Ordering::Relaxed),
                signaling_messages: self.signaling_messages.load(Ordering::Relaxed),
                generic_messages: self.generic_messages.load(Ordering::Relaxed),
                data_channel_messages: self.data_channel_messages.load(Ordering::Relaxed),
                malformed_messages: self.malformed_messages.load(Ordering::Relaxed),
                oversized_messages: self.oversized_messages.load(Ordering::Relaxed),
            },
            fanout: FanoutMetrics {
                broadcasts: self.broadcasts.load(Ordering::Relaxed),
                deliveries: self.deliveries.load(Ordering::Relaxed),
                skipped_closed_recipients: self.skipped_closed_recipients.load(Ordering::Relaxed),
                send_failures: self.send_failures.load(Ordering::Relaxed),
            },
        }
    }
}
