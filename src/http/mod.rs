//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, gate)
//!     → websocket.rs (relay upgrades → RelaySession)
//!     → openai.rs (chat / moderation / transcription → streaming adapter)
//!     → handlers.rs (health and fixed stubs)
//! ```

pub mod handlers;
pub mod openai;
pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer};
