// WebSocket transport and HTTP surface for the relay
//
// - handler: WebSocket upgrade handler (entry point)
// - connection: per-connection reader/writer tasks
// - sending: outbound frame encoding
// - routes: router assembly (CORS, tracing) and server startup
// - api: client/stat inspection endpoints
// - metrics: metrics endpoints and bearer-token authentication
// - prometheus: Prometheus text rendering

mod api;
mod connection;
mod handler;
mod metrics;
mod prometheus;
mod routes;
mod sending;

pub use handler::websocket_handler;
pub use metrics::{metrics_handler, prometheus_metrics_handler};
pub use routes::{create_router, serve};
