//! Small fixed endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::observability::metrics;

pub async fn health() -> Json<serde_json::Value> {
    metrics::record_request("health", 200);
    Json(json!({ "ok": true }))
}

/// Token endpoint placeholder; the gateway issues no tokens.
pub async fn jwt_stub() -> Json<serde_json::Value> {
    metrics::record_request("jwt", 200);
    Json(json!({ "jwt": "" }))
}

/// Speech synthesis is not served by this gateway.
pub async fn gtts_unavailable() -> Response {
    metrics::record_request("gtts", 501);
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(json!({ "error": "Google TTS proxy not configured on this server" })),
    )
        .into_response()
}

pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
}
