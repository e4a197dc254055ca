//! Connection gate.
//!
//! # Responsibilities
//! - Reject upgrades that match no relay prefix
//! - Enforce tenant auth on protected routes
//! - Let self-authenticating relay routes and public routes through
//! - Record every decision (log + counter) without blocking
//!
//! # Design Decisions
//! - `admit` is a pure function over already-extracted facts
//! - Token validation lives behind [`TokenVerifier`]; the gate only sees pass/fail

use crate::observability::metrics;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Upgrade path matches no relay prefix.
    UnknownRelayPrefix,
    /// Tenant auth is on and neither cookie nor bearer was valid.
    MissingCredentials,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::UnknownRelayPrefix => "unknown_relay_prefix",
            DenyReason::MissingCredentials => "missing_credentials",
        }
    }
}

/// Gate outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny(DenyReason),
}

/// Facts about one inbound request, extracted by the middleware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateRequest {
    /// The request asks for a WebSocket upgrade.
    pub is_upgrade: bool,
    /// The path starts with a configured relay prefix.
    pub matches_relay_prefix: bool,
    /// A valid session cookie was presented.
    pub has_credential_cookie: bool,
    /// A valid bearer header was presented.
    pub has_bearer_header: bool,
    /// The route carries its own upstream credential.
    pub is_self_authenticating: bool,
    /// The route is public (health, stubs).
    pub is_public: bool,
}

/// Decide whether a request may proceed.
pub fn admit(request: &GateRequest, tenant_auth_enabled: bool) -> Admission {
    if request.is_upgrade && !request.matches_relay_prefix {
        return Admission::Deny(DenyReason::UnknownRelayPrefix);
    }

    if !tenant_auth_enabled || request.is_self_authenticating || request.is_public {
        return Admission::Allow;
    }

    if request.has_credential_cookie || request.has_bearer_header {
        Admission::Allow
    } else {
        Admission::Deny(DenyReason::MissingCredentials)
    }
}

/// Emit the observability event for a decision.
pub fn record(admission: Admission, path: &str, request_id: &str) {
    match admission {
        Admission::Allow => {
            tracing::debug!(request_id = %request_id, path = %path, "Gate allowed request");
            metrics::record_gate_decision("allow", "ok");
        }
        Admission::Deny(reason) => {
            tracing::warn!(
                request_id = %request_id,
                path = %path,
                reason = reason.as_str(),
                "Gate denied request"
            );
            metrics::record_gate_decision("deny", reason.as_str());
        }
    }
}

/// Pass/fail check for tenant tokens.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> bool;
}

/// Accepts a fixed set of tokens from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: Vec<String>,
}

impl StaticTokens {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }
}

impl TokenVerifier for StaticTokens {
    fn verify(&self, token: &str) -> bool {
        !token.is_empty() && self.tokens.iter().any(|t| t == token)
    }
}
