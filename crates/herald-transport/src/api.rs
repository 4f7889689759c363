//! Bot API client over HTTPS.
//!
//! Docs: <https://core.telegram.org/bots/api#making-requests>

use async_trait::async_trait;
use herald_core::{config::BotConfig, error::HeraldError, traits::RequestGateway};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Response envelope shared by every Bot API method.
#[derive(Debug, Deserialize)]
pub(crate) struct TgResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<i64>,
    pub description: Option<String>,
}

impl TgResponse<Value> {
    fn into_result(self, status: u16) -> Result<Value, HeraldError> {
        if self.ok {
            return Ok(self.result.unwrap_or(Value::Null));
        }
        Err(HeraldError::Protocol {
            code: self.error_code.unwrap_or(i64::from(status)),
            description: self.description.unwrap_or_default(),
        })
    }
}

/// Methods sent as `GET` with their parameters in the query string.
const QUERY_METHODS: &[&str] = &["getUpdates"];

/// [`RequestGateway`] backed by `reqwest`.
///
/// Calls without parameters and the [`QUERY_METHODS`] are sent as `GET`,
/// the rest as a JSON `POST`.
pub struct HttpGateway {
    client: reqwest::Client,
    /// `{base_api_url}/bot{token}` plus `/test` in test mode.
    base_url: String,
    request_timeout: Duration,
}

impl HttpGateway {
    pub fn new(config: &BotConfig) -> Self {
        let env = if config.test_mode { "/test" } else { "" };
        let base_url = format!(
            "{}/bot{}{env}",
            config.base_api_url.trim_end_matches('/'),
            config.token
        );
        Self {
            client: reqwest::Client::new(),
            base_url,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    /// Client-side deadline: the configured timeout plus any long-poll wait.
    fn deadline(&self, method: &str, params: Option<&Value>) -> Duration {
        let long_poll = match (method, params) {
            ("getUpdates", Some(p)) => p.get("timeout").and_then(Value::as_u64).unwrap_or(0),
            _ => 0,
        };
        self.request_timeout + Duration::from_secs(long_poll)
    }
}

#[async_trait]
impl RequestGateway for HttpGateway {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, HeraldError> {
        let url = self.method_url(method);
        let deadline = self.deadline(method, params.as_ref());

        let builder = match params {
            Some(ref p) if QUERY_METHODS.contains(&method) => {
                self.client.get(&url).query(&query_pairs(p))
            }
            Some(ref body) => self.client.post(&url).json(body),
            None => self.client.get(&url),
        };

        // Strip the URL from reqwest errors: it carries the bot token.
        let resp = builder
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| HeraldError::Transport(format!("{method} failed: {}", e.without_url())))?;

        let status = resp.status().as_u16();
        let body: TgResponse<Value> = resp.json().await.map_err(|e| {
            HeraldError::Transport(format!(
                "{method} returned an unreadable body (HTTP {status}): {}",
                e.without_url()
            ))
        })?;

        debug!("{method} -> ok={} (HTTP {status})", body.ok);
        body.into_result(status)
    }
}

/// Flatten an object of parameters into query pairs. Strings go as-is,
/// anything else (numbers, arrays) as its JSON text.
fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let Some(fields) = params.as_object() else {
        return Vec::new();
    };
    fields
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}
