//! Mapping an upgrade path onto an upstream WebSocket url.

use crate::error::RelayError;
use crate::routing::RelayRoute;

/// Resolved upstream endpoint for one relay session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    /// Full upstream url, query string included verbatim.
    pub url: String,
    /// Header carrying the credential.
    pub key_header: String,
    /// Optional `Origin` header.
    pub origin: Option<String>,
    /// Credential name, looked up in [`crate::config::Credentials`].
    pub credential: String,
}

impl UpstreamTarget {
    /// Strip the route prefix from `path` and graft the remainder onto the
    /// upstream base url. The query string is appended unchanged.
    pub fn resolve(route: &RelayRoute, path: &str, query: Option<&str>) -> Result<Self, RelayError> {
        let rest = path
            .strip_prefix(route.prefix.as_str())
            .ok_or_else(|| RelayError::InvalidTarget(format!("`{path}` is outside `{}`", route.prefix)))?;

        let mut url = format!("{}/{}", route.upstream_url, rest);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }

        url::Url::parse(&url).map_err(|e| RelayError::InvalidTarget(format!("{url}: {e}")))?;

        Ok(Self {
            url,
            key_header: route.key_header.clone(),
            origin: route.origin.clone(),
            credential: route.credential.clone(),
        })
    }
}
