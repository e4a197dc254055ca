//! Upstream credentials.
//!
//! Built once at startup from the process environment and shared read-only
//! through an `Arc`. Nothing below `main` reads the environment.

use std::collections::HashMap;
use std::fmt;

use crate::config::schema::GatewayConfig;

/// An upstream API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Immutable set of upstream credentials keyed by credential name.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    keys: HashMap<String, ApiKey>,
}

impl Credentials {
    /// Credentials with no keys configured.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder-style insert, used at startup and in tests.
    pub fn with_key(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.is_empty() {
            self.keys.insert(name.into(), ApiKey::new(key));
        }
        self
    }

    /// Read `<NAME>_API_KEY` for every credential the config refers to.
    ///
    /// Empty variables count as absent. Missing keys are logged, not fatal:
    /// the affected routes degrade per request.
    pub fn from_env(config: &GatewayConfig) -> Self {
        Self::from_lookup(config, |var| std::env::var(var).ok())
    }

    pub(crate) fn from_lookup<F>(config: &GatewayConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut credentials = Self::empty();
        for name in credential_names(config) {
            let var = env_var_name(&name);
            match lookup(&var).filter(|v| !v.trim().is_empty()) {
                Some(key) => credentials = credentials.with_key(name, key.trim()),
                None => tracing::warn!(
                    credential = %name,
                    env = %var,
                    "Upstream credential is not set; dependent routes will degrade"
                ),
            }
        }
        credentials
    }

    pub fn get(&self, name: &str) -> Option<&ApiKey> {
        self.keys.get(name)
    }

    pub fn is_configured(&self, name: &str) -> bool {
        self.keys.contains_key(name)
    }
}

fn credential_names(config: &GatewayConfig) -> Vec<String> {
    let mut names: Vec<String> = config
        .relay
        .routes
        .iter()
        .map(|r| r.credential.clone())
        .chain(std::iter::once(config.openai.credential.clone()))
        .collect();
    names.sort();
    names.dedup();
    names
}

fn env_var_name(credential: &str) -> String {
    let upper: String = credential
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{upper}_API_KEY")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_names() {
        assert_eq!(env_var_name("openai"), "OPENAI_API_KEY");
        assert_eq!(env_var_name("eleven-labs"), "ELEVEN_LABS_API_KEY");
    }

    #[test]
    fn lookup_reads_each_configured_credential() {
        let config = GatewayConfig::default();
        let credentials = Credentials::from_lookup(&config, |var| match var {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "ELEVENLABS_API_KEY" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(credentials.get("openai").map(ApiKey::expose), Some("sk-test"));
        assert!(!credentials.is_configured("elevenlabs"));
    }

    #[test]
    fn debug_redacts_secret() {
        let key = ApiKey::new("super-secret");
        assert_eq!(format!("{key:?}"), "ApiKey(***)");
    }
}
