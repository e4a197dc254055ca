//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! process environment
//!     → credentials.rs (read once at startup)
//!     → Credentials (immutable, shared via Arc)
//! ```
//!
//! # Design Decisions
//! - Config and credentials are immutable once loaded; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod credentials;
pub mod loader;
pub mod schema;
pub mod validation;

pub use credentials::{ApiKey, Credentials};
pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, DegradationConfig, GatewayConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, OpenAiConfig, RelayConfig, RelayRouteConfig, TimeoutConfig,
};
