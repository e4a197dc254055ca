//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// WebSocket relay settings and relay route table.
    pub relay: RelayConfig,

    /// OpenAI-compatible HTTP upstream.
    pub openai: OpenAiConfig,

    /// Tenant authentication layer.
    pub auth: AuthConfig,

    /// Localized messages used by degraded responses.
    pub degradation: DegradationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5174").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5174".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to produce a response head, in seconds.
    pub request_secs: u64,

    /// TCP connect timeout for HTTP upstreams, in seconds.
    pub upstream_connect_secs: u64,

    /// Time allowed for a relay upstream to open, in milliseconds.
    pub dial_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 60,
            upstream_connect_secs: 10,
            dial_ms: 10_000,
        }
    }
}

/// WebSocket relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Frames that may be queued while the upstream is dialing.
    pub max_pending_frames: usize,

    /// Total payload bytes that may be queued while the upstream is dialing.
    pub max_pending_bytes: usize,

    /// Time allowed for delivering a close frame to the peer leg, in milliseconds.
    pub close_timeout_ms: u64,

    /// Relay routes, matched by path prefix.
    pub routes: Vec<RelayRouteConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_pending_frames: 512,
            max_pending_bytes: 4 * 1024 * 1024,
            close_timeout_ms: 2_000,
            routes: vec![RelayRouteConfig::default()],
        }
    }
}

/// One relay prefix mapped to one upstream WebSocket service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayRouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix, with leading and trailing slash (e.g. "/elevenlabs/").
    pub prefix: String,

    /// Upstream base URL (`ws://` or `wss://`), without trailing path.
    pub upstream_url: String,

    /// Name of the credential used to authorize the upstream.
    pub credential: String,

    /// Header carrying the credential on the upstream handshake.
    #[serde(default = "default_key_header")]
    pub key_header: String,

    /// Optional `Origin` header sent upstream.
    #[serde(default)]
    pub origin: Option<String>,
}

fn default_key_header() -> String {
    "xi-api-key".to_string()
}

impl Default for RelayRouteConfig {
    fn default() -> Self {
        Self {
            name: "elevenlabs".to_string(),
            prefix: "/elevenlabs/".to_string(),
            upstream_url: "wss://api.elevenlabs.io".to_string(),
            credential: "elevenlabs".to_string(),
            key_header: default_key_header(),
            origin: Some("https://api.elevenlabs.io".to_string()),
        }
    }
}

/// OpenAI-compatible upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Base URL, e.g. "https://api.openai.com".
    pub base_url: String,

    /// Name of the credential holding the API key.
    pub credential: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            credential: "openai".to_string(),
        }
    }
}

/// Tenant authentication.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Enable the tenant-auth layer.
    pub enabled: bool,

    /// Cookie carrying the session token.
    pub cookie_name: String,

    /// Tokens accepted from the cookie or a bearer header.
    pub tokens: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cookie_name: "session".to_string(),
            tokens: Vec::new(),
        }
    }
}

/// Messages delivered to clients when an upstream is unavailable.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DegradationConfig {
    pub unconfigured_message: String,
    pub quota_message: String,
    pub error_message: String,
    pub unavailable_message: String,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            unconfigured_message: "OpenAI no configurado en servidor. ".to_string(),
            quota_message: "OpenAI: cuota excedida. Usando respuesta local.".to_string(),
            error_message: "OpenAI: error. Usando respuesta local.".to_string(),
            unavailable_message: "OpenAI no disponible. ".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics listener address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
        }
    }
}
