//! Default value functions for configuration fields.
//!
//! Used by serde's `#[serde(default = ...)]` attributes and by the `Default`
//! impls of the section structs, so both paths agree.

use super::logging::LogFormat;
use super::relay::MalformedPolicy;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    8080
}

// =============================================================================
// Relay Defaults
// =============================================================================

pub const fn default_malformed_policy() -> MalformedPolicy {
    MalformedPolicy::Sink
}

pub const fn default_outbound_queue_capacity() -> usize {
    1024
}

pub const fn default_client_timeout_secs() -> u64 {
    300 // 5 minutes
}

pub const fn default_cleanup_interval_secs() -> u64 {
    60
}

pub const fn default_announce_client_id() -> bool {
    true
}

// =============================================================================
// WebSocket Defaults
// =============================================================================

pub const fn default_max_message_size() -> usize {
    2 * 1024 * 1024 // 2 MiB
}

pub const fn default_max_frame_size() -> usize {
    16 * 1024 * 1024 // 16 MiB
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "relay.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

// =============================================================================
// Security Defaults
// =============================================================================

pub fn default_cors_origins() -> String {
    "*".to_string()
}

pub const fn default_require_metrics_auth() -> bool {
    false
}
