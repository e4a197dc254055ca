//! Degradation policy.
//!
//! # Responsibilities
//! - Map a failure class and the calling endpoint to a synthetic response
//! - Keep streaming callers on a well-formed event stream no matter what
//! - Give UI-tolerant endpoints success-shaped stubs instead of errors
//!
//! # Design Decisions
//! - `classify` is pure; rendering happens in `IntoResponse`
//! - Localized texts come from config, everything else is fixed

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::DegradationConfig;
use crate::error::UpstreamError;
use crate::observability::metrics;
use crate::streaming::frame::{encode_stream, StreamFrame, EVENT_STREAM};

/// What went wrong with an upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// No credential configured; no upstream call was made.
    MissingCredential,
    /// Upstream answered 429.
    QuotaExceeded,
    /// Upstream answered another non-success status.
    UpstreamStatus,
    /// Upstream could not be reached or did not answer in time.
    Unreachable,
    /// Upstream answered with something unusable.
    Malformed,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::MissingCredential => "missing_credential",
            FailureClass::QuotaExceeded => "quota_exceeded",
            FailureClass::UpstreamStatus => "upstream_status",
            FailureClass::Unreachable => "unreachable",
            FailureClass::Malformed => "malformed",
        }
    }
}

impl From<&UpstreamError> for FailureClass {
    fn from(err: &UpstreamError) -> Self {
        match err {
            UpstreamError::MissingCredential(_) => FailureClass::MissingCredential,
            UpstreamError::Unreachable(_) | UpstreamError::TimedOut(_) => FailureClass::Unreachable,
            UpstreamError::Malformed(_) => FailureClass::Malformed,
        }
    }
}

/// The endpoint shape a degraded response must fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Chat completion with `stream: true`.
    ChatStream,
    /// Chat completion without streaming.
    Chat,
    /// Moderation check.
    Moderation,
    /// Audio transcription.
    Transcription,
}

/// Body shape of a degraded response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// One apology delta plus `[DONE]`.
    EventStream,
    /// A complete chat completion carrying the apology.
    ChatCompletionStub,
    /// A neutral, unflagged moderation result.
    ModerationStub,
    /// `{"error": message}`.
    JsonError,
}

/// A policy decision, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedResponse {
    pub failure: FailureClass,
    pub status: StatusCode,
    pub body: BodyKind,
    pub message: String,
}

/// Failure-to-response mapping shared by every HTTP endpoint.
#[derive(Debug, Clone, Default)]
pub struct DegradationPolicy {
    messages: DegradationConfig,
}

impl DegradationPolicy {
    pub fn new(messages: DegradationConfig) -> Self {
        Self { messages }
    }

    /// Localized apology shown to end users.
    pub fn apology(&self, failure: FailureClass) -> &str {
        match failure {
            FailureClass::MissingCredential => &self.messages.unconfigured_message,
            FailureClass::QuotaExceeded => &self.messages.quota_message,
            FailureClass::Unreachable => &self.messages.unavailable_message,
            FailureClass::UpstreamStatus | FailureClass::Malformed => &self.messages.error_message,
        }
    }

    pub fn classify(&self, failure: FailureClass, surface: Surface) -> DegradedResponse {
        let (status, body) = match (surface, failure) {
            (Surface::ChatStream, _) => (StatusCode::OK, BodyKind::EventStream),

            (Surface::Chat, FailureClass::MissingCredential) => (StatusCode::OK, BodyKind::ChatCompletionStub),
            (Surface::Chat, _) => (StatusCode::BAD_GATEWAY, BodyKind::JsonError),

            (Surface::Moderation, _) => (StatusCode::OK, BodyKind::ModerationStub),

            (Surface::Transcription, FailureClass::MissingCredential) => {
                (StatusCode::UNAUTHORIZED, BodyKind::JsonError)
            }
            (Surface::Transcription, _) => (StatusCode::BAD_GATEWAY, BodyKind::JsonError),
        };

        let message = match body {
            BodyKind::EventStream | BodyKind::ChatCompletionStub => self.apology(failure).to_string(),
            BodyKind::ModerationStub => String::new(),
            BodyKind::JsonError => error_text(failure).to_string(),
        };

        DegradedResponse {
            failure,
            status,
            body,
            message,
        }
    }
}

fn error_text(failure: FailureClass) -> &'static str {
    match failure {
        FailureClass::MissingCredential => "upstream API key is not configured on server",
        FailureClass::QuotaExceeded => "upstream quota exceeded",
        FailureClass::UpstreamStatus => "upstream error",
        FailureClass::Unreachable => "upstream unavailable",
        FailureClass::Malformed => "malformed upstream response",
    }
}

/// Fixed neutral moderation result.
pub fn moderation_stub() -> serde_json::Value {
    json!({
        "id": "stub-moderation",
        "model": "stub",
        "results": [ { "flagged": false, "categories": {}, "category_scores": {} } ]
    })
}

impl IntoResponse for DegradedResponse {
    fn into_response(self) -> Response {
        metrics::record_degraded(self.failure.as_str());
        match self.body {
            BodyKind::EventStream => (
                self.status,
                [(header::CONTENT_TYPE, EVENT_STREAM), (header::CACHE_CONTROL, "no-cache")],
                encode_stream(&[StreamFrame::new("fallback", self.message)]),
            )
                .into_response(),
            BodyKind::ChatCompletionStub => (
                self.status,
                Json(json!({
                    "id": "fallback",
                    "object": "chat.completion",
                    "model": "stub",
                    "choices": [{
                        "index": 0,
                        "message": { "role": "assistant", "content": self.message },
                        "finish_reason": "stop"
                    }]
                })),
            )
                .into_response(),
            BodyKind::ModerationStub => (self.status, Json(moderation_stub())).into_response(),
            BodyKind::JsonError => (self.status, Json(json!({ "error": self.message }))).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> DegradationPolicy {
        DegradationPolicy::new(DegradationConfig::default())
    }

    #[test]
    fn streaming_callers_always_get_an_event_stream() {
        for failure in [
            FailureClass::MissingCredential,
            FailureClass::QuotaExceeded,
            FailureClass::UpstreamStatus,
            FailureClass::Unreachable,
            FailureClass::Malformed,
        ] {
            let degraded = policy().classify(failure, Surface::ChatStream);
            assert_eq!(degraded.status, StatusCode::OK);
            assert_eq!(degraded.body, BodyKind::EventStream);
            assert!(!degraded.message.is_empty());
        }
    }

    #[test]
    fn quota_apology_is_localized() {
        let degraded = policy().classify(FailureClass::QuotaExceeded, Surface::ChatStream);
        assert_eq!(degraded.message, "OpenAI: cuota excedida. Usando respuesta local.");
    }

    #[test]
    fn moderation_defaults_to_unflagged() {
        for failure in [
            FailureClass::MissingCredential,
            FailureClass::QuotaExceeded,
            FailureClass::Unreachable,
            FailureClass::Malformed,
        ] {
            let degraded = policy().classify(failure, Surface::Moderation);
            assert_eq!(degraded.status, StatusCode::OK);
            assert_eq!(degraded.body, BodyKind::ModerationStub);
        }
        assert_eq!(moderation_stub()["results"][0]["flagged"], false);
    }

    #[test]
    fn timed_out_call_counts_as_unreachable() {
        let err = UpstreamError::TimedOut(std::time::Duration::from_secs(1));
        assert_eq!(FailureClass::from(&err), FailureClass::Unreachable);
        let degraded = policy().classify(FailureClass::from(&err), Surface::ChatStream);
        assert_eq!(degraded.message, "OpenAI no disponible. ");
    }

    #[test]
    fn missing_credential_on_chat_is_success_shaped() {
        let degraded = policy().classify(FailureClass::MissingCredential, Surface::Chat);
        assert_eq!(degraded.status, StatusCode::OK);
        assert_eq!(degraded.body, BodyKind::ChatCompletionStub);
    }

    #[test]
    fn transcription_errors_stay_errors() {
        let missing = policy().classify(FailureClass::MissingCredential, Surface::Transcription);
        assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
        let down = policy().classify(FailureClass::Unreachable, Surface::Transcription);
        assert_eq!(down.status, StatusCode::BAD_GATEWAY);
        assert_eq!(down.body, BodyKind::JsonError);
    }
}
