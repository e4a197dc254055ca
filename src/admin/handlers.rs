use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub tenant_auth: bool,
    pub openai_configured: bool,
    /// Credential name to presence, never the value.
    pub credentials: BTreeMap<String, bool>,
}

#[derive(Debug, Serialize)]
pub struct RelayRouteStatus {
    pub name: String,
    pub prefix: String,
    pub upstream_url: String,
    pub credential_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub active: u64,
    pub total: u64,
    pub routes: Vec<RelayRouteStatus>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let credentials = std::iter::once(state.config.openai.credential.as_str())
        .chain(state.routes.relays().map(|r| r.credential.as_str()))
        .map(|name| (name.to_string(), state.credentials.is_configured(name)))
        .collect();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        tenant_auth: state.config.auth.enabled,
        openai_configured: state.openai.is_configured(),
        credentials,
    })
}

pub async fn get_sessions(State(state): State<AppState>) -> Json<SessionSummary> {
    let routes = state
        .routes
        .relays()
        .map(|r| RelayRouteStatus {
            name: r.name.clone(),
            prefix: r.prefix.clone(),
            upstream_url: r.upstream_url.clone(),
            credential_configured: state.credentials.is_configured(&r.credential),
        })
        .collect();

    Json(SessionSummary {
        active: state.sessions.active(),
        total: state.sessions.total(),
        routes,
    })
}
