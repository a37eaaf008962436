use chrono::Utc;

use super::relay::BroadcastReport;
use super::{RelayError, RelayServer};
use crate::broadcast::RelayPayload;
use crate::config::MalformedPolicy;
use crate::protocol::{classify, ClassifiedMessage, ClientId, DataChannelKind};

/// Where an inbound message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Forwarded to the other clients.
    Relayed(BroadcastReport),
    /// Consumed by the local sink.
    Consumed(DataChannelKind),
    /// Not JSON; logged by the sink and dropped.
    MalformedSunk,
    /// Sender is not registered or no longer open.
    Ignored,
}

impl RelayServer {
    /// Classify one inbound message and route it.
    ///
    /// Callers must feed a connection's messages one at a time, in arrival
    /// order: each relayed payload is enqueued on every recipient before this
    /// returns, which is what keeps per-sender order intact.
    pub fn handle_inbound(&self, sender_id: &ClientId, raw: RelayPayload) -> DispatchOutcome {
        let Some(sender) = self.registry.get(sender_id) else {
            tracing::debug!(client_id = %sender_id, "Dropping message from unregistered client");
            return DispatchOutcome::Ignored;
        };
        if sender.state() != super::ConnectionState::Open {
            return DispatchOutcome::Ignored;
        }

        sender.touch();
        self.metrics.increment_messages_received();
        let received_at = Utc::now();

        match classify(raw) {
            ClassifiedMessage::Signaling { signal_type, raw } => {
                self.metrics.increment_signaling_messages();
                tracing::debug!(client_id = %sender_id, %signal_type, size = raw.len(), "Signaling message");
                DispatchOutcome::Relayed(self.relay.broadcast(sender_id, &raw))
            }
            ClassifiedMessage::Generic { type_tag, raw } => {
                self.metrics.increment_generic_messages();
                tracing::debug!(
                    client_id = %sender_id,
                    type_tag = type_tag.as_deref().unwrap_or("<none>"),
                    size = raw.len(),
                    "Generic message"
                );
                DispatchOutcome::Relayed(self.relay.broadcast(sender_id, &raw))
            }
            ClassifiedMessage::DataChannel(message) => {
                self.metrics.increment_data_channel_messages();
                self.sink.consume(&message, &sender, received_at);
                DispatchOutcome::Consumed(message.kind)
            }
            ClassifiedMessage::Malformed { raw } => {
                self.metrics.increment_malformed_messages();
                let error = RelayError::MalformedPayload {
                    client_id: sender_id.clone(),
                    size: raw.len(),
                };
                tracing::debug!(%error, policy = %self.config.malformed_policy, "Malformed message");

                match self.config.malformed_policy {
                    MalformedPolicy::Sink => {
                        self.sink.consume_malformed(&raw, sender_id, received_at);
                        DispatchOutcome::MalformedSunk
                    }
                    MalformedPolicy::Broadcast => {
                        DispatchOutcome::Relayed(self.relay.broadcast(sender_id, &raw))
                    }
                }
            }
        }
    }
}
