//! Local consumer for data-channel traffic.
//!
//! Nothing that reaches the sink is ever forwarded. It keeps running counters,
//! a per-client webcam-frame sequence with a notice-rate estimate, and emits
//! one structured log line per message.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use super::registry::{ConnectionHandle, ConnectionState};
use crate::broadcast::RelayPayload;
use crate::protocol::{ClientId, DataChannelKind, DataChannelMessage};

/// Notices kept per client for the rate estimate.
pub const FPS_WINDOW: usize = 10;

/// Characters of a text note included in its log line.
const LOG_TEXT_PREVIEW: usize = 120;

/// Read-only copy of the sink counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkStats {
    pub total: u64,
    pub webcam_frames: u64,
}

/// Webcam-frame bookkeeping for one client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFrameStats {
    pub webcam_frames: u64,
    pub fps: f64,
    pub last_frame_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct FrameTracker {
    sequence: u64,
    recent: VecDeque<DateTime<Utc>>,
    fps: f64,
}

impl FrameTracker {
    fn record(&mut self, at: DateTime<Utc>) -> u64 {
        self.sequence += 1;
        self.recent.push_back(at);
        if self.recent.len() > FPS_WINDOW {
            self.recent.pop_front();
        }
        self.fps = average_rate(&self.recent);
        self.sequence
    }

    fn stats(&self) -> ClientFrameStats {
        ClientFrameStats {
            webcam_frames: self.sequence,
            fps: self.fps,
            last_frame_at: self.recent.back().copied(),
        }
    }
}

/// Mean rate over consecutive intervals; 0 with fewer than two samples or a
/// zero-length window.
fn average_rate(samples: &VecDeque<DateTime<Utc>>) -> f64 {
    let (Some(first), Some(last)) = (samples.front(), samples.back()) else {
        return 0.0;
    };
    let intervals = samples.len().saturating_sub(1);
    if intervals == 0 {
        return 0.0;
    }
    let span = (*last - *first).num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0;
    if span <= 0.0 {
        return 0.0;
    }
    intervals as f64 / span
}

#[derive(Debug, Default)]
pub struct MessageSink {
    total: AtomicU64,
    webcam_frames: AtomicU64,
    clients: DashMap<ClientId, FrameTracker>,
}

impl MessageSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one data-channel message and log it.
    ///
    /// A sender that closes while its notice is being recorded keeps no
    /// per-client entry behind.
    pub fn consume(
        &self,
        message: &DataChannelMessage,
        sender: &ConnectionHandle,
        received_at: DateTime<Utc>,
    ) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let sender_id = sender.id();
        let timestamp = message.timestamp.as_deref();

        match message.kind {
            DataChannelKind::WebcamFrameNotice => {
                self.webcam_frames.fetch_add(1, Ordering::Relaxed);
                let frame = self
                    .clients
                    .entry(sender_id.clone())
                    .or_default()
                    .record(received_at);
                // Disconnect cleanup may have run between the caller's state
                // check and the insert above
                if sender.state() == ConnectionState::Closed {
                    self.clients.remove(sender_id);
                }
                tracing::info!(
                    client_id = %sender_id,
                    kind = message.kind.as_str(),
                    frame,
                    size = message.reported_size(),
                    %received_at,
                    timestamp,
                    "Webcam frame received"
                );
            }
            DataChannelKind::TextNote => {
                let text = message.text().unwrap_or_default();
                let preview: String = text.chars().take(LOG_TEXT_PREVIEW).collect();
                tracing::info!(
                    client_id = %sender_id,
                    kind = message.kind.as_str(),
                    text = %preview,
                    size = text.len(),
                    %received_at,
                    timestamp,
                    "Data-channel text received"
                );
            }
            DataChannelKind::RawBinary => {
                tracing::info!(
                    client_id = %sender_id,
                    kind = message.kind.as_str(),
                    size = message.reported_size(),
                    %received_at,
                    timestamp,
                    "Data-channel binary received"
                );
            }
        }
    }

    /// Account for a payload that could not be parsed. Logged as raw binary
    /// and counted in the total; never forwarded.
    pub fn consume_malformed(
        &self,
        raw: &RelayPayload,
        sender_id: &ClientId,
        received_at: DateTime<Utc>,
    ) {
        self.total.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            client_id = %sender_id,
            kind = DataChannelKind::RawBinary.as_str(),
            frame_kind = raw.kind().as_str(),
            size = raw.len(),
            %received_at,
            "Unparseable message received"
        );
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            total: self.total.load(Ordering::Relaxed),
            webcam_frames: self.webcam_frames.load(Ordering::Relaxed),
        }
    }

    /// Zero both counters and restart every per-client frame sequence.
    pub fn reset_stats(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.webcam_frames.store(0, Ordering::Relaxed);
        self.clients.clear();
        tracing::info!("Sink statistics reset");
    }

    pub fn client_frames(&self, client_id: &str) -> ClientFrameStats {
        self.clients
            .get(client_id)
            .map(|tracker| tracker.stats())
            .unwrap_or(ClientFrameStats {
                webcam_frames: 0,
                fps: 0.0,
                last_frame_at: None,
            })
    }

    pub fn forget_client(&self, client_id: &str) {
        self.clients.remove(client_id);
    }

    /// Clients that currently hold frame bookkeeping.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}
