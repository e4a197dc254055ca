//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Upgrade request path
//!     → router.rs (longest relay prefix)
//!     → RelayRoute or None
//!
//! Route Compilation (at startup):
//!     RelayRouteConfig[]
//!     → Sort by prefix length
//!     → Freeze as immutable RouteTable
//! ```

pub mod router;

pub use router::{RelayRoute, RouteTable, PUBLIC_PATHS};
