//! Timeout enforcement.
//!
//! # Responsibilities
//! - Turn configured seconds/milliseconds into `Duration`s once at startup
//! - Provide one place every deadline is read from
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities at the call sites
//! - The request deadline covers an upstream's response head, and a JSON
//!   body only when it has to be read whole; streamed bodies and open relay
//!   sessions are not cut off

use std::time::Duration;

use crate::config::TimeoutConfig;

/// Resolved deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    /// Deadline for fixed endpoints and for each HTTP upstream answer.
    pub request: Duration,
    /// TCP/TLS connect deadline for HTTP upstreams.
    pub upstream_connect: Duration,
    /// Upgrade handshake deadline for relay upstreams.
    pub dial: Duration,
}

impl From<&TimeoutConfig> for Deadlines {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            request: Duration::from_secs(config.request_secs),
            upstream_connect: Duration::from_secs(config.upstream_connect_secs),
            dial: Duration::from_millis(config.dial_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_units() {
        let deadlines = Deadlines::from(&TimeoutConfig {
            request_secs: 30,
            upstream_connect_secs: 5,
            dial_ms: 250,
        });
        assert_eq!(deadlines.request, Duration::from_secs(30));
        assert_eq!(deadlines.upstream_connect, Duration::from_secs(5));
        assert_eq!(deadlines.dial, Duration::from_millis(250));
    }
}
