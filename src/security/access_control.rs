//! Gate middleware.
//! Extracts gate facts from the request and enforces the decision.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::routing::RouteTable;
use crate::security::gate::{self, Admission, DenyReason, GateRequest, TokenVerifier};

/// State required by the gate middleware.
#[derive(Clone)]
pub struct GateState {
    pub routes: Arc<RouteTable>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub auth_enabled: bool,
    pub cookie_name: String,
}

pub async fn gate_middleware(
    State(state): State<GateState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let headers = req.headers();
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let is_upgrade = is_websocket_upgrade(headers);
    let matches_relay_prefix = state.routes.resolve_relay(&path).is_some();
    let facts = GateRequest {
        is_upgrade,
        matches_relay_prefix,
        has_credential_cookie: cookie_value(headers, &state.cookie_name)
            .is_some_and(|token| state.verifier.verify(token)),
        has_bearer_header: bearer_token(headers).is_some_and(|token| state.verifier.verify(token)),
        is_self_authenticating: is_upgrade && matches_relay_prefix,
        is_public: state.routes.is_public(&path),
    };

    let admission = gate::admit(&facts, state.auth_enabled);
    gate::record(admission, &path, &request_id);

    match admission {
        Admission::Allow => next.run(req).await,
        // No upgrade happens and the socket is not kept alive.
        Admission::Deny(DenyReason::UnknownRelayPrefix) => {
            (StatusCode::NOT_FOUND, [(header::CONNECTION, "close")]).into_response()
        }
        Admission::Deny(DenyReason::MissingCredentials) => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "authentication required" })),
        )
            .into_response(),
    }
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}
