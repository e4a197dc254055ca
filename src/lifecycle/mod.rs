//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → in-flight HTTP requests finish → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup lives in `main`: config, logging, credentials, listener
//! - A second signal is not special; the runtime exits once `main` returns

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
