//! Error types for heimdallr-llm

use thiserror::Error;

/// Errors raised while talking to the chat-completions endpoint or a data source
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport failure (connect, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Endpoint answered with a non-success status
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Response had no choices or empty content
    #[error("completion contained no content")]
    EmptyCompletion,

    /// `OPENAI_API_KEY` is not set
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    /// A data source is half-configured
    #[error("{0} is not set")]
    MissingSetting(&'static str),

    /// Log search job was accepted without an id
    #[error("log search job response carried no id")]
    MissingJobId,

    /// Environment variable present but unparseable
    #[error("invalid setting {key}={value:?}")]
    InvalidSetting { key: String, value: String },

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.to_string())
    }
}

impl LlmError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(_) | LlmError::EmptyCompletion => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
