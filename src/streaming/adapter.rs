//! HTTP to event-stream adaptation.
//!
//! # Data Flow
//! ```text
//! UpstreamReply (status, content-type, body stream)
//!     → plan()
//!         Passthrough  → forward status, content type and bytes as they arrive
//!         Mirror       → forward status + body verbatim
//!         Synthesize   → read JSON, emit one delta + [DONE]
//!         Degrade      → DegradationPolicy
//! ```
//!
//! # Design Decisions
//! - Only the synthesize path buffers the whole body, under a deadline
//! - Streaming callers never see an upstream error status; degraded and
//!   synthesized streams are always 200

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::{stream::BoxStream, StreamExt, TryStreamExt};

use crate::error::UpstreamError;
use crate::relay::frame::truncate_utf8;
use crate::resilience::degradation::{DegradationPolicy, FailureClass, Surface};
use crate::streaming::frame::{encode_stream, is_event_stream, StreamFrame, EVENT_STREAM};

/// Raw bodies longer than this are cut before being shown to a user.
pub const RAW_PREVIEW_BYTES: usize = 512;

/// Byte stream of an upstream body.
pub type ByteStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// Status, content type and body of an upstream HTTP response.
pub struct UpstreamReply {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl UpstreamReply {
    pub fn new(status: StatusCode, content_type: Option<String>, body: ByteStream) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    /// Fully buffered reply, mostly for tests.
    pub fn from_bytes(status: StatusCode, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self::new(
            status,
            content_type.map(str::to_string),
            futures_util::stream::once(async move { Ok(body) }).boxed(),
        )
    }

    pub fn from_reqwest(response: reqwest::Response) -> Self {
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes_stream().map_err(UpstreamError::Unreachable).boxed();
        Self::new(status, content_type, body)
    }

    /// Read the whole body.
    pub async fn collect(mut self) -> Result<Bytes, UpstreamError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Read the whole body, giving up after `deadline`.
    pub async fn collect_within(self, deadline: Duration) -> Result<Bytes, UpstreamError> {
        tokio::time::timeout(deadline, self.collect())
            .await
            .map_err(|_| UpstreamError::TimedOut(deadline))?
    }

    /// Forward status, content type and body untouched.
    pub fn mirror(self) -> Response {
        let content_type = self
            .content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));
        let mut response = Response::new(Body::from_stream(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        response
    }
}

/// How a reply will be turned into a client response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Passthrough,
    Mirror,
    Synthesize,
    Degrade(FailureClass),
}

pub fn plan(status: StatusCode, content_type: Option<&str>, wants_stream: bool) -> Plan {
    if !wants_stream {
        return Plan::Mirror;
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Plan::Degrade(FailureClass::QuotaExceeded);
    }
    if !status.is_success() {
        return Plan::Degrade(FailureClass::UpstreamStatus);
    }
    if is_event_stream(content_type) {
        Plan::Passthrough
    } else {
        Plan::Synthesize
    }
}

/// Turn a complete JSON completion into a single delta frame.
///
/// Missing id falls back to `"json"`, missing content to empty. A body that
/// is not JSON becomes a `"raw"` frame carrying its first bytes.
pub fn synthesize(body: &[u8]) -> StreamFrame {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => {
            let id = value.get("id").and_then(|v| v.as_str()).unwrap_or("json");
            let content = value
                .pointer("/choices/0/message/content")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            StreamFrame::new(id, content)
        }
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            StreamFrame::new("raw", truncate_utf8(&text, RAW_PREVIEW_BYTES))
        }
    }
}

fn event_stream_response(status: StatusCode, content_type: HeaderValue, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

/// Adapt an upstream chat reply for a client.
///
/// `deadline` bounds reading a JSON body for synthesis; passthrough and
/// mirrored bodies stream for as long as the upstream keeps sending.
pub async fn adapt(
    reply: UpstreamReply,
    wants_stream: bool,
    policy: &DegradationPolicy,
    deadline: Duration,
) -> Response {
    let surface = if wants_stream { Surface::ChatStream } else { Surface::Chat };

    match plan(reply.status, reply.content_type.as_deref(), wants_stream) {
        Plan::Mirror => reply.mirror(),
        Plan::Passthrough => {
            let content_type = reply
                .content_type
                .as_deref()
                .and_then(|ct| HeaderValue::from_str(ct).ok())
                .unwrap_or_else(|| HeaderValue::from_static(EVENT_STREAM));
            event_stream_response(reply.status, content_type, Body::from_stream(reply.body))
        }
        Plan::Degrade(failure) => {
            tracing::warn!(
                status = reply.status.as_u16(),
                failure = failure.as_str(),
                "Upstream refused streaming request; degrading"
            );
            policy.classify(failure, surface).into_response()
        }
        Plan::Synthesize => match reply.collect_within(deadline).await {
            Ok(body) => {
                let frame = synthesize(&body);
                tracing::debug!(id = %frame.id, "Synthesized stream from JSON reply");
                event_stream_response(
                    StatusCode::OK,
                    HeaderValue::from_static(EVENT_STREAM),
                    Body::from(encode_stream(&[frame])),
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, "Upstream body failed before synthesis");
                policy.classify(FailureClass::from(&e), surface).into_response()
            }
        },
    }
}
