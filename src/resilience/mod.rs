//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream call:
//!     → timeouts.rs (connect deadline, dial deadline)
//!     → On failure: degradation.rs (failure class + endpoint → synthetic response)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - No retries: chat requests are not idempotent and the UI prefers a fast fallback
//! - Degraded responses are always well-formed for the endpoint that asked

pub mod degradation;
pub mod timeouts;

pub use degradation::{DegradationPolicy, DegradedResponse, FailureClass, Surface};
