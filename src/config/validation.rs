//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, bounds > 0)
//! - Detect conflicting relay prefixes
//! - Keep relay prefixes free of router syntax
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("relay route `{route}`: prefix `{prefix}` must start and end with '/'")]
    Prefix { route: String, prefix: String },

    #[error("relay route `{route}`: prefix `{prefix}` contains reserved character `{found}`")]
    PrefixCharacter { route: String, prefix: String, found: char },

    #[error("relay prefix `{0}` is declared more than once")]
    DuplicatePrefix(String),

    #[error("relay route `{route}`: upstream url `{url}` must be a ws:// or wss:// url")]
    UpstreamUrl { route: String, url: String },

    #[error("openai.base_url `{0}` must be an http:// or https:// url")]
    OpenAiUrl(String),

    #[error("auth is enabled but no tokens are configured")]
    NoAuthTokens,

    #[error("admin api is enabled but admin.api_key is empty")]
    NoAdminKey,
}

/// Characters the router reads as path syntax, plus ones that cannot appear
/// in a request path.
const RESERVED_PREFIX_CHARS: &[char] = &['{', '}', '*', ':', '?', '#'];

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let positive = [
        ("listener.max_body_bytes", config.listener.max_body_bytes as u64),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.upstream_connect_secs", config.timeouts.upstream_connect_secs),
        ("timeouts.dial_ms", config.timeouts.dial_ms),
        ("relay.max_pending_frames", config.relay.max_pending_frames as u64),
        ("relay.max_pending_bytes", config.relay.max_pending_bytes as u64),
        ("relay.close_timeout_ms", config.relay.close_timeout_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let mut seen = HashSet::new();
    for route in &config.relay.routes {
        if route.prefix.len() < 2 || !route.prefix.starts_with('/') || !route.prefix.ends_with('/') {
            errors.push(ValidationError::Prefix {
                route: route.name.clone(),
                prefix: route.prefix.clone(),
            });
        }
        if let Some(found) = route
            .prefix
            .chars()
            .find(|c| RESERVED_PREFIX_CHARS.contains(c) || c.is_whitespace())
        {
            errors.push(ValidationError::PrefixCharacter {
                route: route.name.clone(),
                prefix: route.prefix.clone(),
                found,
            });
        }
        if !seen.insert(route.prefix.as_str()) {
            errors.push(ValidationError::DuplicatePrefix(route.prefix.clone()));
        }
        let scheme_ok = Url::parse(&route.upstream_url)
            .map(|u| matches!(u.scheme(), "ws" | "wss") && u.host_str().is_some())
            .unwrap_or(false);
        if !scheme_ok {
            errors.push(ValidationError::UpstreamUrl {
                route: route.name.clone(),
                url: route.upstream_url.clone(),
            });
        }
    }

    let openai_ok = Url::parse(&config.openai.base_url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);
    if !openai_ok {
        errors.push(ValidationError::OpenAiUrl(config.openai.base_url.clone()));
    }

    if config.auth.enabled && config.auth.tokens.is_empty() {
        errors.push(ValidationError::NoAuthTokens);
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::NoAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RelayRouteConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.timeouts.dial_ms = 0;
        config.relay.routes.push(RelayRouteConfig {
            name: "bad".into(),
            prefix: "voice".into(),
            upstream_url: "https://not-a-socket.example.com".into(),
            ..RelayRouteConfig::default()
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::BindAddress("nowhere".into())));
        assert!(errors.contains(&ValidationError::Zero { field: "timeouts.dial_ms" }));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Prefix { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UpstreamUrl { .. })));
    }

    #[test]
    fn rejects_duplicate_prefix() {
        let mut config = GatewayConfig::default();
        config.relay.routes.push(RelayRouteConfig::default());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicatePrefix("/elevenlabs/".into())]);
    }

    #[test]
    fn rejects_router_syntax_in_prefix() {
        for (prefix, found) in [("/voice/{id}/", '{'), ("/voice/*/", '*'), ("/:voice/", ':'), ("/a b/", ' ')] {
            let mut config = GatewayConfig::default();
            config.relay.routes[0].prefix = prefix.into();
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(
                errors,
                vec![ValidationError::PrefixCharacter {
                    route: config.relay.routes[0].name.clone(),
                    prefix: prefix.into(),
                    found,
                }]
            );
        }
    }

    #[test]
    fn auth_requires_tokens() {
        let mut config = GatewayConfig::default();
        config.auth.enabled = true;
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoAuthTokens]));
    }
}
