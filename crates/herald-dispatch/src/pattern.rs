//! Match patterns for free-text and callback subscriptions.

use herald_core::error::HeraldError;
use regex::Regex;
use std::fmt;

/// How a subscription matches a string payload. Fixed at registration time.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Whole-string equality.
    Exact(String),
    /// `starts_with`.
    Prefix(String),
    /// Regex search anywhere in the input.
    Regex(Regex),
}

impl Pattern {
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact(value.into())
    }

    pub fn prefix(value: impl Into<String>) -> Self {
        Self::Prefix(value.into())
    }

    /// Compile `source` as a regex. An invalid expression is a setup error.
    pub fn regex(source: &str) -> Result<Self, HeraldError> {
        Regex::new(source)
            .map(Self::Regex)
            .map_err(|e| HeraldError::Config(format!("invalid pattern '{source}': {e}")))
    }

    /// Legacy string form: `/expr/` is a regex, anything else is exact.
    pub fn delimited(source: &str) -> Result<Self, HeraldError> {
        match source
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(inner) => Self::regex(inner),
            None => Ok(Self::exact(source)),
        }
    }

    pub fn is_match(&self, input: &str) -> bool {
        match self {
            Self::Exact(value) => input == value,
            Self::Prefix(value) => input.starts_with(value.as_str()),
            Self::Regex(re) => re.is_match(input),
        }
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Self::exact(value)
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Self::Exact(value)
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Self::Regex(re)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(value) => write!(f, "{value:?}"),
            Self::Prefix(value) => write!(f, "{value:?}*"),
            Self::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}
