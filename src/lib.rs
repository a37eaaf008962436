#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools
)]

//! # Signal Relay
//!
//! A real-time signaling relay. Clients connect over WebSocket; every
//! signaling message one client sends is forwarded, unmodified, to every
//! other connected client, while data-channel traffic is consumed locally
//! for logging and statistics.
//!
//! In-memory only: no persistence, no clustering, no media.

/// Relay payloads and outbound queue frames
pub mod broadcast;

/// Configuration loading and validation
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// Message classification and wire shapes
pub mod protocol;

/// Client registry, broadcast fan-out and the local message sink
pub mod server;

/// WebSocket transport and HTTP endpoints
pub mod websocket;
