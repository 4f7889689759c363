use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::is_http_url;
use crate::error::HeraldError;

/// Delivery mode. Exactly one is active per bot, chosen at startup.
///
/// `mode` selects the variant and defaults to polling when omitted.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TransportConfig {
    Polling(PollingConfig),
    Webhook(WebhookConfig),
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Mode {
    #[default]
    Polling,
    Webhook,
}

impl<'de> Deserialize<'de> for TransportConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Tagged {
            #[serde(default)]
            mode: Mode,
            #[serde(flatten)]
            fields: Map<String, Value>,
        }

        let Tagged { mode, fields } = Tagged::deserialize(deserializer)?;
        let fields = Value::Object(fields);
        match mode {
            Mode::Polling => serde_json::from_value(fields).map(Self::Polling),
            Mode::Webhook => serde_json::from_value(fields).map(Self::Webhook),
        }
        .map_err(de::Error::custom)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Polling(PollingConfig::default())
    }
}

impl TransportConfig {
    /// Short name for logs and `status`.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Polling(_) => "polling",
            Self::Webhook(_) => "webhook",
        }
    }

    pub fn validate(&self) -> Result<(), HeraldError> {
        match self {
            Self::Polling(p) => p.validate(),
            Self::Webhook(w) => w.validate(),
        }
    }
}

/// Long-polling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Server-side long-poll wait in seconds.
    #[serde(default = "default_poll_timeout")]
    pub timeout: u64,
    /// Maximum updates per batch (1..=100).
    #[serde(default = "default_poll_limit")]
    pub limit: u32,
    /// Fixed delay before retrying a failed fetch.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout: default_poll_timeout(),
            limit: default_poll_limit(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl PollingConfig {
    pub fn validate(&self) -> Result<(), HeraldError> {
        if !(1..=100).contains(&self.limit) {
            return Err(HeraldError::Config(format!(
                "polling limit must be between 1 and 100, got {}",
                self.limit
            )));
        }
        Ok(())
    }
}

/// Webhook listener parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Public base URL the platform will POST to, e.g. `https://bot.example.com`.
    #[serde(default)]
    pub domain: String,
    /// Local bind address.
    #[serde(default = "default_webhook_host")]
    pub host: String,
    /// Local bind port. 0 picks an ephemeral port.
    #[serde(default = "default_webhook_port")]
    pub port: u16,
    /// Secret URL path. A random one is generated when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            host: default_webhook_host(),
            port: default_webhook_port(),
            path: None,
        }
    }
}

impl WebhookConfig {
    pub fn validate(&self) -> Result<(), HeraldError> {
        if !is_http_url(&self.domain) {
            return Err(HeraldError::Config(format!(
                "webhook domain must be an absolute http(s) URL, got '{}'",
                self.domain
            )));
        }
        if let Some(ref path) = self.path {
            if !path.starts_with('/') {
                return Err(HeraldError::Config(format!(
                    "webhook path must start with '/', got '{path}'"
                )));
            }
        }
        Ok(())
    }
}

fn default_poll_timeout() -> u64 {
    1
}
fn default_poll_limit() -> u32 {
    100
}
fn default_retry_delay() -> u64 {
    2000
}
fn default_webhook_host() -> String {
    "0.0.0.0".to_string()
}
fn default_webhook_port() -> u16 {
    443
}
