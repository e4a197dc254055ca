//! OpenAI HTTP client.
//!
//! Thin wrapper over a shared `reqwest::Client`: base url, bearer auth, a
//! connect deadline and a deadline for the response head. Replies come back as
//! [`UpstreamReply`] so bodies can be streamed straight to the client.

use std::time::Duration;

use axum::http::HeaderValue;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::config::{ApiKey, Credentials, OpenAiConfig};
use crate::error::UpstreamError;
use crate::resilience::timeouts::Deadlines;
use crate::streaming::UpstreamReply;

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    credential: String,
    key: Option<ApiKey>,
    deadline: Duration,
}

impl OpenAiClient {
    pub fn new(
        config: &OpenAiConfig,
        deadlines: &Deadlines,
        credentials: &Credentials,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(deadlines.upstream_connect)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credential: config.credential.clone(),
            key: credentials.get(&config.credential).cloned(),
            deadline: deadlines.request,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    /// How long a call may wait for the upstream to answer.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn key(&self) -> Result<&ApiKey, UpstreamError> {
        self.key
            .as_ref()
            .ok_or_else(|| UpstreamError::MissingCredential(self.credential.clone()))
    }

    /// POST a JSON body verbatim.
    pub async fn post_json(&self, path: &str, body: Bytes) -> Result<UpstreamReply, UpstreamError> {
        self.post(path, body, HeaderValue::from_static("application/json")).await
    }

    /// POST an opaque body (multipart uploads) with the caller's content type.
    pub async fn post_raw(
        &self,
        path: &str,
        body: Bytes,
        content_type: Option<HeaderValue>,
    ) -> Result<UpstreamReply, UpstreamError> {
        let content_type = content_type.unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
        self.post(path, body, content_type).await
    }

    async fn post(&self, path: &str, body: Bytes, content_type: HeaderValue) -> Result<UpstreamReply, UpstreamError> {
        let key = self.key()?;
        let url = self.url(path);
        tracing::debug!(url = %url, bytes = body.len(), "Calling upstream");

        let send = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", key.expose()))
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send();

        let response = tokio::time::timeout(self.deadline, send)
            .await
            .map_err(|_| UpstreamError::TimedOut(self.deadline))?
            .map_err(UpstreamError::Unreachable)?;

        tracing::debug!(url = %url, status = response.status().as_u16(), "Upstream responded");
        Ok(UpstreamReply::from_reqwest(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeoutConfig;

    fn client(credentials: Credentials) -> OpenAiClient {
        let deadlines = Deadlines::from(&TimeoutConfig::default());
        OpenAiClient::new(&OpenAiConfig::default(), &deadlines, &credentials).unwrap()
    }

    #[test]
    fn configured_only_with_key() {
        assert!(!client(Credentials::empty()).is_configured());
        assert!(client(Credentials::empty().with_key("openai", "sk-test")).is_configured());
    }

    #[tokio::test]
    async fn missing_key_short_circuits() {
        let err = client(Credentials::empty())
            .post_json("/v1/chat/completions", Bytes::from_static(b"{}"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, UpstreamError::MissingCredential(name) if name == "openai"));
    }
}
