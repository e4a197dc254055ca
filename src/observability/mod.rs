//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gate, relay sessions and HTTP handlers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID and session ID flow through log fields
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
