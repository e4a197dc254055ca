//! WebSocket relay entry point.
//!
//! # Responsibilities
//! - Map the upgrade path onto a relay route and upstream target
//! - Complete the client handshake immediately, before the upstream is dialed
//! - Hand the accepted socket to a [`RelaySession`] task
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Gateway ←──── WebSocket frames ────→ Upstream
//! ```

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::http::server::AppState;
use crate::relay::{Leg, RelaySession, UpstreamTarget};

pub async fn relay_handler(State(state): State<AppState>, uri: Uri, ws: WebSocketUpgrade) -> Response {
    let path = uri.path();
    let Some(route) = state.routes.resolve_relay(path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let target = match UpstreamTarget::resolve(&route, path, uri.query()) {
        Ok(target) => target,
        Err(e) => {
            tracing::warn!(route = %route.name, path = %path, error = %e, "Rejecting relay upgrade");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    // A missing key still upgrades; the session closes the socket with 1008.
    let key = state.credentials.get(&target.credential).cloned();
    let connector = state.connector.clone();
    let settings = state.relay_settings.clone();
    let sessions = state.sessions.clone();
    let route_name = route.name.clone();

    ws.on_failed_upgrade(|e| tracing::warn!(error = %e, "Client upgrade failed"))
        .on_upgrade(move |socket| async move {
            let session = RelaySession::new(sessions.track(), target, key, connector, settings);
            tracing::info!(session_id = %session.id(), route = %route_name, "Relay session accepted");
            session.run(Leg::from_client(socket)).await;
        })
}
