//! OpenAI-compatible endpoints.
//!
//! Request bodies are forwarded byte for byte; only the chat `stream` flag is
//! read. Every failure ends in a policy-shaped response, never a bare error.
//! Upstream calls carry their own deadline, so a slow upstream degrades like
//! an unreachable one.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::UpstreamError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::resilience::{FailureClass, Surface};
use crate::streaming::{self, UpstreamReply};

const CHAT_PATH: &str = "/v1/chat/completions";
const MODERATION_PATH: &str = "/v1/moderations";
const TRANSCRIPTION_PATH: &str = "/v1/audio/transcriptions";

/// Whether a chat request body asks for a streamed reply.
pub fn wants_stream(body: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("stream").and_then(serde_json::Value::as_bool))
        .unwrap_or(false)
}

fn log_failure(endpoint: &'static str, err: &UpstreamError) {
    match err {
        UpstreamError::MissingCredential(name) => {
            tracing::debug!(endpoint, credential = %name, "Upstream not configured; degrading")
        }
        other => tracing::warn!(endpoint, error = %other, "Upstream call failed; degrading"),
    }
}

pub async fn chat_completions(State(state): State<AppState>, body: Bytes) -> Response {
    let wants_stream = wants_stream(&body);
    let surface = if wants_stream { Surface::ChatStream } else { Surface::Chat };

    let response = match state.openai.post_json(CHAT_PATH, body).await {
        Ok(reply) => streaming::adapt(reply, wants_stream, &state.policy, state.openai.deadline()).await,
        Err(e) => {
            log_failure("chat_completions", &e);
            state.policy.classify(FailureClass::from(&e), surface).into_response()
        }
    };

    metrics::record_request("chat_completions", response.status().as_u16());
    response
}

/// Read a moderation reply; a success body must be JSON.
async fn read_moderation(reply: UpstreamReply, deadline: Duration) -> Result<UpstreamReply, UpstreamError> {
    let status = reply.status;
    let content_type = reply.content_type.clone();
    let body = reply.collect_within(deadline).await?;

    if status.is_success() && serde_json::from_slice::<serde_json::Value>(&body).is_err() {
        return Err(UpstreamError::Malformed(format!("{} byte non-JSON moderation body", body.len())));
    }
    Ok(UpstreamReply::from_bytes(status, content_type.as_deref(), body))
}

pub async fn moderations(State(state): State<AppState>, body: Bytes) -> Response {
    let degrade = |e: UpstreamError| {
        log_failure("moderations", &e);
        state.policy.classify(FailureClass::from(&e), Surface::Moderation).into_response()
    };

    let response = match state.openai.post_json(MODERATION_PATH, body).await {
        Ok(reply) if reply.status == StatusCode::TOO_MANY_REQUESTS => state
            .policy
            .classify(FailureClass::QuotaExceeded, Surface::Moderation)
            .into_response(),
        Ok(reply) => match read_moderation(reply, state.openai.deadline()).await {
            Ok(reply) => reply.mirror(),
            Err(e) => degrade(e),
        },
        Err(e) => degrade(e),
    };

    metrics::record_request("moderations", response.status().as_u16());
    response
}

pub async fn transcriptions(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers.get(header::CONTENT_TYPE).cloned();

    let response = match state.openai.post_raw(TRANSCRIPTION_PATH, body, content_type).await {
        Ok(reply) => reply.mirror(),
        Err(e) => {
            log_failure("transcriptions", &e);
            state.policy.classify(FailureClass::from(&e), Surface::Transcription).into_response()
        }
    };

    metrics::record_request("transcriptions", response.status().as_u16());
    response
}
