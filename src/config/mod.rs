//! Configuration for the relay.
//!
//! Layered JSON documents (inline env var, stdin, file, defaults) followed by
//! `SIGNAL_RELAY__*` per-field environment overrides.
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`relay`]: Dispatch policy, outbound queues, idle-client reaping
//! - [`websocket`]: Transport size limits
//! - [`security`]: CORS and metrics-endpoint authentication
//! - [`logging`]: Logging configuration
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod relay;
pub mod security;
pub mod types;
pub mod validation;
pub mod websocket;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use relay::{MalformedPolicy, RelayConfig};

pub use security::SecurityConfig;

pub use types::Config;

pub use validation::validate_config;

pub use websocket::WebSocketConfig;
