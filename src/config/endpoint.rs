//! Endpoint configuration

use crate::protocol::{Dialect, ModelParams};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Forward proxy settings for one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy for `http://` targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    /// Proxy for `https://` targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https: Option<String>,
    /// Comma-separated hosts that bypass the proxy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
}

impl ProxyConfig {
    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none()
    }
}

/// One configured backend.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub id: String,
    /// Display name, defaults to the id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the credential when `api_key` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    /// Preferred on success-rate ties
    #[serde(default)]
    pub default: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl EndpointConfig {
    pub fn new(
        id: impl Into<String>,
        dialect: Dialect,
        url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            dialect,
            url: url.into(),
            api_key: None,
            api_key_env: None,
            model: model.into(),
            timeout_seconds: default_timeout_seconds(),
            temperature: None,
            max_tokens: None,
            tls_verify: true,
            proxy: None,
            default: false,
            enabled: true,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Credential to send as a bearer token, if any.
    pub fn credential(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn model_params(&self) -> ModelParams<'_> {
        ModelParams {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

// Keeps credentials out of debug output.
impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dialect", &self.dialect)
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("model", &self.model)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("tls_verify", &self.tls_verify)
            .field("proxy", &self.proxy)
            .field("default", &self.default)
            .field("enabled", &self.enabled)
            .finish()
    }
}
