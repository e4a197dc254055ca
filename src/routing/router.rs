//! Route lookup.
//!
//! # Responsibilities
//! - Store relay routes compiled from config
//! - Resolve an upgrade path to its relay route
//! - Classify HTTP paths as public or protected
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Longest prefix wins, so nested prefixes behave predictably
//! - Explicit `None` rather than a silent default route

use std::sync::Arc;

use crate::config::RelayRouteConfig;

/// Paths served without tenant authentication.
pub const PUBLIC_PATHS: &[&str] = &["/health", "/app/jwt/get"];

/// Prefixes guarded by their own auth instead of tenant auth.
pub const SELF_AUTH_PREFIXES: &[&str] = &["/admin/"];

/// A compiled relay route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRoute {
    pub name: String,
    pub prefix: String,
    pub upstream_url: String,
    pub credential: String,
    pub key_header: String,
    pub origin: Option<String>,
}

impl From<&RelayRouteConfig> for RelayRoute {
    fn from(config: &RelayRouteConfig) -> Self {
        Self {
            name: config.name.clone(),
            prefix: config.prefix.clone(),
            upstream_url: config.upstream_url.trim_end_matches('/').to_string(),
            credential: config.credential.clone(),
            key_header: config.key_header.clone(),
            origin: config.origin.clone(),
        }
    }
}

/// Immutable relay route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    relays: Vec<Arc<RelayRoute>>,
}

impl RouteTable {
    pub fn from_config(routes: &[RelayRouteConfig]) -> Self {
        let mut relays: Vec<Arc<RelayRoute>> =
            routes.iter().map(|r| Arc::new(RelayRoute::from(r))).collect();
        relays.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { relays }
    }

    /// Find the relay route whose prefix starts `path`.
    pub fn resolve_relay(&self, path: &str) -> Option<Arc<RelayRoute>> {
        self.relays
            .iter()
            .find(|r| path.starts_with(r.prefix.as_str()))
            .cloned()
    }

    pub fn relays(&self) -> impl Iterator<Item = &Arc<RelayRoute>> {
        self.relays.iter()
    }

    /// Whether `path` is exempt from tenant authentication.
    pub fn is_public(&self, path: &str) -> bool {
        PUBLIC_PATHS.contains(&path) || SELF_AUTH_PREFIXES.iter().any(|p| path.starts_with(p))
    }
}
