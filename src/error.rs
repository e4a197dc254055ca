//! Error types for the gateway.
//!
//! Every variant is scoped to one session or one request; nothing here is
//! allowed to reach the process.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while servicing a relay session.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Connect, TLS or network failure on the upstream leg.
    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),

    /// The upstream did not open in time.
    #[error("upstream dial timed out after {0:?}")]
    DialTimeout(Duration),

    /// The upstream sent something that is not valid WebSocket traffic.
    #[error("upstream protocol error: {0}")]
    UpstreamProtocol(String),

    /// The client leg misbehaved or failed.
    #[error("client protocol error: {0}")]
    ClientProtocol(String),

    /// Too much client traffic arrived before the upstream opened.
    #[error("pending buffer exhausted ({frames} frames, {bytes} bytes)")]
    BufferExhausted { frames: usize, bytes: usize },

    /// The upgrade path could not be mapped to an upstream url.
    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),
}

impl RelayError {
    /// Classify a tungstenite failure on the upstream leg.
    pub fn from_upstream(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Io(e) => Self::UpstreamTransport(e.to_string()),
            WsError::Tls(e) => Self::UpstreamTransport(e.to_string()),
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                Self::UpstreamTransport("connection closed".to_string())
            }
            WsError::Http(response) => {
                Self::UpstreamTransport(format!("handshake rejected with status {}", response.status()))
            }
            other => Self::UpstreamProtocol(other.to_string()),
        }
    }

    /// Classify an axum WebSocket failure on the client leg.
    pub fn from_client(err: axum::Error) -> Self {
        Self::ClientProtocol(err.to_string())
    }
}

/// Errors raised while calling an HTTP upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream credential `{0}` is not configured")]
    MissingCredential(String),

    #[error("upstream unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("upstream did not answer within {0:?}")]
    TimedOut(Duration),

    #[error("malformed upstream response: {0}")]
    Malformed(String),
}
