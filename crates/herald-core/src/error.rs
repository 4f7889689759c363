use thiserror::Error;

/// Top-level error type for Herald.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Missing or invalid setup parameters. Fatal at startup.
    #[error("config error: {0}")]
    Config(String),

    /// Network or HTTP failure talking to the platform.
    #[error("transport error: {0}")]
    Transport(String),

    /// The platform answered with `ok: false`.
    #[error("platform error {code}: {description}")]
    Protocol { code: i64, description: String },

    /// A payload could not be decoded into the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// A handler failed while processing an update.
    #[error("handler error: {0}")]
    Handler(String),

    /// `start()` was called on a transport that is already running.
    #[error("transport is already running")]
    AlreadyRunning,

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HeraldError {
    /// Whether the polling loop should back off and retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Protocol { .. } | Self::Parse(_) | Self::Serialization(_)
        )
    }
}
