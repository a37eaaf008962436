//! Relay behavior configuration.

use super::defaults::{
    default_announce_client_id, default_cleanup_interval_secs, default_client_timeout_secs,
    default_malformed_policy, default_outbound_queue_capacity,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens to a payload that does not parse as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Log it through the local sink; never forward.
    #[default]
    Sink,
    /// Forward it opaquely to the other clients like any generic message.
    Broadcast,
}

impl MalformedPolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sink => "sink",
            Self::Broadcast => "broadcast",
        }
    }
}

impl fmt::Display for MalformedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relay configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    /// Handling of non-JSON payloads
    #[serde(default = "default_malformed_policy")]
    pub malformed_policy: MalformedPolicy,
    /// Frames buffered per connection before sends to it start failing
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    /// Disconnect clients silent for this many seconds (0 disables)
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,
    /// How often the idle-client sweep runs, in seconds
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Send a `connection-established` notice with the assigned id on accept
    #[serde(default = "default_announce_client_id")]
    pub announce_client_id: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            malformed_policy: default_malformed_policy(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            client_timeout_secs: default_client_timeout_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            announce_client_id: default_announce_client_id(),
        }
    }
}
