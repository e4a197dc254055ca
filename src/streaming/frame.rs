//! SSE wire format for chat deltas.
//!
//! ```text
//! data: {"id":"abc","choices":[{"delta":{"content":"hi"}}]}\n\n
//! data: [DONE]\n\n
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

/// Terminal sentinel frame.
pub const DONE: &str = "data: [DONE]\n\n";

/// Content type for event streams.
pub const EVENT_STREAM: &str = "text/event-stream";

/// One synthetic chat delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub id: String,
    pub content: String,
}

#[derive(Serialize)]
struct Wire<'a> {
    id: &'a str,
    choices: [WireChoice<'a>; 1],
}

#[derive(Serialize)]
struct WireChoice<'a> {
    delta: WireDelta<'a>,
}

#[derive(Serialize)]
struct WireDelta<'a> {
    content: &'a str,
}

impl StreamFrame {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }

    /// Encode as a single `data:` event.
    pub fn to_sse(&self) -> String {
        let wire = Wire {
            id: &self.id,
            choices: [WireChoice {
                delta: WireDelta { content: &self.content },
            }],
        };
        let json = serde_json::to_string(&wire).expect("string-only frame always serializes");
        format!("data: {json}\n\n")
    }
}

/// Encode `frames` followed by the `[DONE]` sentinel.
pub fn encode_stream(frames: &[StreamFrame]) -> Bytes {
    let mut buf = BytesMut::new();
    for frame in frames {
        buf.put_slice(frame.to_sse().as_bytes());
    }
    buf.put_slice(DONE.as_bytes());
    buf.freeze()
}

/// Whether a content type denotes an event stream.
pub fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with(EVENT_STREAM))
        .unwrap_or(false)
}
