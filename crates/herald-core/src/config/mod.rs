mod transport;

#[cfg(test)]
mod tests;

pub use transport::*;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::HeraldError;

/// Environment variable that overrides `bot.token`.
pub const TOKEN_ENV: &str = "HERALD_BOT_TOKEN";

/// Top-level Herald configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub herald: HeraldConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Bot API credentials and endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_base_api_url")]
    pub base_api_url: String,
    /// Update kinds to receive. Empty = platform default.
    #[serde(default)]
    pub allowed_updates: Vec<String>,
    /// Route calls to the platform test environment.
    #[serde(default)]
    pub test_mode: bool,
    /// Client-side timeout per call, added on top of any long-poll wait.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_api_url: default_base_api_url(),
            allowed_updates: Vec::new(),
            test_mode: false,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Config {
    /// Reject configurations that cannot start a bot.
    pub fn validate(&self) -> Result<(), HeraldError> {
        if self.bot.token.trim().is_empty() {
            return Err(HeraldError::Config(format!(
                "bot token must be a non-empty string. Set bot.token in config.toml or {TOKEN_ENV}."
            )));
        }
        if !is_http_url(&self.bot.base_api_url) {
            return Err(HeraldError::Config(format!(
                "base_api_url must be an http(s) URL, got '{}'",
                self.bot.base_api_url
            )));
        }
        self.transport.validate()
    }
}

/// Whether `url` is an absolute http(s) URL with a non-empty host.
pub(crate) fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => rest
            .split(['/', '?', '#'])
            .next()
            .is_some_and(|host| !host.is_empty()),
        None => false,
    }
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}
fn default_base_api_url() -> String {
    "https://api.telegram.org".to_string()
}
fn default_request_timeout() -> u64 {
    10
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. A non-empty
/// [`TOKEN_ENV`] always wins over the file's token.
pub fn load(path: &str) -> Result<Config, HeraldError> {
    let path = Path::new(path);
    let mut config = if !path.exists() {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    } else {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HeraldError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| HeraldError::Config(format!("failed to parse config: {}", e)))?
    };

    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            config.bot.token = token;
        }
    }

    Ok(config)
}
