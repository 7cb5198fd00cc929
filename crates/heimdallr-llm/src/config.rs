//! Endpoint settings read from the environment.

use std::str::FromStr;
use std::time::Duration;

use crate::error::LlmError;
use crate::Result;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";

/// Connection and sampling settings for [`crate::OpenAiExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_key: String,
    /// Base URL without the `/chat/completions` suffix.
    pub base_url: String,
    pub model: String,
    pub organization: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// First backoff delay; doubles on each further retry.
    pub backoff_base_ms: u64,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            organization: None,
            temperature: 0.7,
            timeout_secs: 60,
            max_retries: 3,
            backoff_base_ms: 500,
        }
    }

    /// Read `OPENAI_*` and `LLM_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        let mut config = Self::new(api_key);

        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        config.organization = lookup("OPENAI_ORGANIZATION").filter(|o| !o.trim().is_empty());
        if let Some(v) = parse(&lookup, "LLM_TEMPERATURE")? {
            config.temperature = v;
        }
        if let Some(v) = parse(&lookup, "LLM_TIMEOUT")? {
            config.timeout_secs = v;
        }
        if let Some(v) = parse(&lookup, "LLM_MAX_RETRIES")? {
            config.max_retries = v;
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

pub(crate) fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| LlmError::InvalidSetting {
                key: key.to_string(),
                value: raw,
            }),
    }
}
