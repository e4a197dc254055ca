//! Transport-neutral WebSocket frames.
//!
//! The client leg speaks axum's message type and the upstream leg speaks
//! tungstenite's; both convert into [`RelayFrame`] so the session logic is
//! written once.

use axum::extract::ws;
use bytes::Bytes;
use tokio_tungstenite::tungstenite::{self, protocol::frame::coding::CloseCode};

/// Policy violation (missing credential).
pub const CLOSE_POLICY: u16 = 1008;
/// Internal error (dial failure, leg error, exhausted buffer).
pub const CLOSE_INTERNAL: u16 = 1011;

/// Close reasons are limited to 123 bytes on the wire.
const MAX_REASON_BYTES: usize = 123;

/// Close code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn policy(reason: impl Into<String>) -> Self {
        Self::new(CLOSE_POLICY, reason)
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(CLOSE_INTERNAL, reason)
    }

    /// Make a peer-supplied close safe to put on the other leg's wire.
    ///
    /// Codes that may not be sent (reserved, unassigned, or out of range)
    /// become 1011; the reason is cut to 123 bytes on a char boundary.
    pub fn sanitized(self) -> Self {
        let code = if is_sendable(self.code) {
            self.code
        } else {
            CLOSE_INTERNAL
        };
        Self {
            code,
            reason: truncate_utf8(&self.reason, MAX_REASON_BYTES).to_string(),
        }
    }
}

fn is_sendable(code: u16) -> bool {
    matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
pub(crate) fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// One WebSocket message as seen by a relay session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseReason>),
}

impl RelayFrame {
    /// Text and binary frames carry application data; the rest is control.
    pub fn is_data(&self) -> bool {
        matches!(self, RelayFrame::Text(_) | RelayFrame::Binary(_))
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, RelayFrame::Binary(_))
    }

    /// Payload size used for buffer accounting.
    pub fn payload_len(&self) -> usize {
        match self {
            RelayFrame::Text(s) => s.len(),
            RelayFrame::Binary(b) | RelayFrame::Ping(b) | RelayFrame::Pong(b) => b.len(),
            RelayFrame::Close(_) => 0,
        }
    }
}

impl From<ws::Message> for RelayFrame {
    fn from(msg: ws::Message) -> Self {
        match msg {
            ws::Message::Text(text) => RelayFrame::Text(text.as_str().to_owned()),
            ws::Message::Binary(data) => RelayFrame::Binary(data),
            ws::Message::Ping(data) => RelayFrame::Ping(data),
            ws::Message::Pong(data) => RelayFrame::Pong(data),
            ws::Message::Close(frame) => RelayFrame::Close(frame.map(|f| CloseReason {
                code: f.code,
                reason: f.reason.as_str().to_owned(),
            })),
        }
    }
}

impl From<RelayFrame> for ws::Message {
    fn from(frame: RelayFrame) -> Self {
        match frame {
            RelayFrame::Text(text) => ws::Message::Text(text.into()),
            RelayFrame::Binary(data) => ws::Message::Binary(data),
            RelayFrame::Ping(data) => ws::Message::Ping(data),
            RelayFrame::Pong(data) => ws::Message::Pong(data),
            RelayFrame::Close(reason) => ws::Message::Close(reason.map(|r| ws::CloseFrame {
                code: r.code,
                reason: r.reason.into(),
            })),
        }
    }
}

impl From<tungstenite::Message> for RelayFrame {
    fn from(msg: tungstenite::Message) -> Self {
        match msg {
            tungstenite::Message::Text(text) => RelayFrame::Text(text.as_str().to_owned()),
            tungstenite::Message::Binary(data) => RelayFrame::Binary(data),
            tungstenite::Message::Ping(data) => RelayFrame::Ping(data),
            tungstenite::Message::Pong(data) => RelayFrame::Pong(data),
            tungstenite::Message::Close(frame) => RelayFrame::Close(frame.map(|f| CloseReason {
                code: u16::from(f.code),
                reason: f.reason.as_str().to_owned(),
            })),
            // Raw frames only appear when writing; treat as an empty pong.
            tungstenite::Message::Frame(_) => RelayFrame::Pong(Bytes::new()),
        }
    }
}

impl From<RelayFrame> for tungstenite::Message {
    fn from(frame: RelayFrame) -> Self {
        match frame {
            RelayFrame::Text(text) => tungstenite::Message::Text(text.into()),
            RelayFrame::Binary(data) => tungstenite::Message::Binary(data),
            RelayFrame::Ping(data) => tungstenite::Message::Ping(data),
            RelayFrame::Pong(data) => tungstenite::Message::Pong(data),
            RelayFrame::Close(reason) => {
                tungstenite::Message::Close(reason.map(|r| tungstenite::protocol::CloseFrame {
                    code: CloseCode::from(r.code),
                    reason: r.reason.into(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_valid_codes() {
        let close = CloseReason::new(1000, "bye").sanitized();
        assert_eq!(close, CloseReason::new(1000, "bye"));
        assert_eq!(CloseReason::new(4001, "app").sanitized().code, 4001);
        assert_eq!(CloseReason::new(1008, "policy").sanitized().code, 1008);
    }

    #[test]
    fn sanitize_replaces_reserved_codes() {
        for code in [0, 999, 1004, 1005, 1006, 1015, 2000, 5000] {
            assert_eq!(CloseReason::new(code, "x").sanitized().code, CLOSE_INTERNAL, "code {code}");
        }
    }

    #[test]
    fn sanitize_truncates_reason_on_char_boundary() {
        let long = "é".repeat(100);
        let close = CloseReason::new(1000, long).sanitized();
        assert!(close.reason.len() <= 123);
        assert_eq!(close.reason.len(), 122);
    }

    #[test]
    fn binary_flag_survives_both_conversions() {
        let payload = Bytes::from_static(&[0, 159, 146, 150]);
        let frame = RelayFrame::from(tungstenite::Message::Binary(payload.clone()));
        assert!(frame.is_binary());
        match ws::Message::from(frame) {
            ws::Message::Binary(data) => assert_eq!(data, payload),
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn close_code_round_trips_through_tungstenite() {
        let msg = tungstenite::Message::from(RelayFrame::Close(Some(CloseReason::new(4000, "done"))));
        assert_eq!(RelayFrame::from(msg), RelayFrame::Close(Some(CloseReason::new(4000, "done"))));
    }
}
