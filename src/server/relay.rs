use std::sync::Arc;

use serde::Serialize;

use super::registry::{ClientRegistry, SendError};
use super::RelayError;
use crate::broadcast::{OutboundFrame, RelayPayload};
use crate::metrics::RelayMetrics;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Connections in the snapshot (everyone but the sender).
    pub recipients: usize,
    pub delivered: usize,
    /// Recipients that were already closed and were skipped.
    pub skipped_closed: usize,
    /// Recipients whose queue rejected the frame.
    pub failed: usize,
}

/// Forwards payloads verbatim to every other live connection.
pub struct BroadcastRelay {
    registry: Arc<ClientRegistry>,
    metrics: Arc<RelayMetrics>,
}

impl BroadcastRelay {
    pub fn new(registry: Arc<ClientRegistry>, metrics: Arc<RelayMetrics>) -> Self {
        Self { registry, metrics }
    }

    /// Deliver `payload` to all connections except `sender_id`.
    ///
    /// Never blocks and never removes connections. A failure on one recipient
    /// is logged and the loop moves on.
    pub fn broadcast(&self, sender_id: &str, payload: &RelayPayload) -> BroadcastReport {
        let recipients = self.registry.others_except(sender_id);
        let mut report = BroadcastReport {
            recipients: recipients.len(),
            ..BroadcastReport::default()
        };

        for recipient in &recipients {
            if !recipient.is_open() {
                report.skipped_closed += 1;
                continue;
            }

            match recipient.try_send(OutboundFrame::Payload(payload.clone())) {
                Ok(()) => report.delivered += 1,
                // Closed between the open check and the enqueue
                Err(SendError::Closed) => report.skipped_closed += 1,
                Err(err @ SendError::QueueFull) => {
                    report.failed += 1;
                    let failure = RelayError::SendFailure {
                        client_id: recipient.id().clone(),
                        reason: err,
                    };
                    tracing::warn!(
                        sender_id,
                        recipient_id = %recipient.id(),
                        error = %failure,
                        "Dropped relayed message"
                    );
                }
            }
        }

        self.metrics.record_broadcast(
            report.delivered as u64,
            report.skipped_closed as u64,
            report.failed as u64,
        );

        tracing::debug!(
            sender_id,
            kind = payload.kind().as_str(),
            size = payload.len(),
            recipients = report.recipients,
            delivered = report.delivered,
            "Relayed message"
        );

        report
    }
}
