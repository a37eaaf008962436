//! WebSocket transport configuration.

use super::defaults::{default_max_frame_size, default_max_message_size};
use serde::{Deserialize, Serialize};

/// WebSocket configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebSocketConfig {
    /// Largest message relayed or consumed; bigger ones are dropped and the
    /// connection stays open
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Hard transport limit for a frame or message; exceeding it closes the
    /// connection
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl WebSocketConfig {
    /// Validate WebSocket configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_message_size == 0 {
            anyhow::bail!("websocket.max_message_size must be greater than zero");
        }
        if self.max_frame_size == 0 {
            anyhow::bail!("websocket.max_frame_size must be greater than zero");
        }
        if self.max_frame_size < self.max_message_size {
            anyhow::bail!(
                "websocket.max_frame_size ({}) must not be below websocket.max_message_size ({})",
                self.max_frame_size,
                self.max_message_size
            );
        }
        Ok(())
    }
}
