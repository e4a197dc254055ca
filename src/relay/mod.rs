//! WebSocket relay subsystem.
//!
//! # Data Flow
//! ```text
//! Client ←── frames ──→ RelaySession ←── frames ──→ Upstream
//!                         │
//!                         ├─ target.rs    (prefix → upstream url)
//!                         ├─ connector.rs (dial upstream, wrap legs)
//!                         ├─ pending.rs   (bounded FIFO while dialing)
//!                         └─ frame.rs     (neutral frames, close codes)
//! ```
//!
//! # Design Decisions
//! - One task per session; no state shared between sessions
//! - Text/binary tag and bytes forwarded unmodified
//! - Close frames propagated in both directions, codes sanitized
//! - Ping/pong answered by each transport, not forwarded
//! - Only the dial is timed; open sessions have no idle timeout

pub mod connector;
pub mod frame;
pub mod pending;
pub mod session;
pub mod target;
pub mod tracker;

pub use connector::{Leg, TungsteniteConnector, UpstreamConnector};
pub use frame::{CloseReason, RelayFrame, CLOSE_INTERNAL, CLOSE_POLICY};
pub use session::{RelaySession, RelaySettings, SessionState, Termination};
pub use target::UpstreamTarget;
pub use tracker::{SessionGuard, SessionId, SessionTracker};
