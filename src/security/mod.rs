//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request or upgrade:
//!     → access_control.rs (extract cookie, bearer, upgrade, route facts)
//!     → gate.rs (admit / deny, observability event)
//!     → Pass to handlers
//! ```
//!
//! # Design Decisions
//! - Fail closed: unknown upgrade prefixes never reach a handler
//! - Relay routes authorize upstream with a server-held key, so tenant auth
//!   does not apply to them

pub mod access_control;
pub mod gate;

pub use access_control::{gate_middleware, GateState};
pub use gate::{admit, Admission, DenyReason, GateRequest, StaticTokens, TokenVerifier};
