//! Relay gateway library.
//!
//! WebSocket relay with handshake buffering, an HTTP to SSE streaming
//! adapter, and the gate and degradation policy around them.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod streaming;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
