//! Engine configuration.
//!
//! Defaults, optionally layered with a TOML file, then with `HEIMDALLR_*`
//! environment variables.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::DEFAULT_ESCALATION_THRESHOLD;
use crate::coordinator::DEFAULT_MAX_PARALLELISM;
use crate::domain::error::{HeimdallrError, Result};

pub const ENV_MAX_PARALLELISM: &str = "HEIMDALLR_MAX_PARALLELISM";
pub const ENV_ESCALATION_THRESHOLD: &str = "HEIMDALLR_ESCALATION_THRESHOLD";
pub const ENV_STEP_TIMEOUT_SECS: &str = "HEIMDALLR_STEP_TIMEOUT_SECS";
pub const ENV_PATTERN_EXTRACTION: &str = "HEIMDALLR_PATTERN_EXTRACTION";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeimdallrConfig {
    /// Upper bound on steps running at once within a level.
    pub max_parallelism: usize,
    /// Rule confidence at or above which the classifier does not escalate.
    pub escalation_threshold: f64,
    /// Per-step executor timeout; 0 disables it.
    pub step_timeout_secs: u64,
    /// Run executor-backed pattern extraction after classification.
    pub pattern_extraction: bool,
}

impl Default for HeimdallrConfig {
    fn default() -> Self {
        Self {
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            step_timeout_secs: 0,
            pattern_extraction: true,
        }
    }
}

impl HeimdallrConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Load a TOML file; absent keys keep their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, ENV_MAX_PARALLELISM)? {
            self.max_parallelism = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_ESCALATION_THRESHOLD)? {
            self.escalation_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_STEP_TIMEOUT_SECS)? {
            self.step_timeout_secs = v;
        }
        if let Some(raw) = lookup(ENV_PATTERN_EXTRACTION) {
            self.pattern_extraction = parse_flag(ENV_PATTERN_EXTRACTION, &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_parallelism == 0 {
            return Err(HeimdallrError::InvalidConfig(
                "max_parallelism must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.escalation_threshold) {
            return Err(HeimdallrError::InvalidConfig(format!(
                "escalation_threshold must be within [0, 1], got {}",
                self.escalation_threshold
            )));
        }
        Ok(())
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| HeimdallrError::InvalidConfig(format!("{key}={raw:?}: {e}"))),
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HeimdallrError::InvalidConfig(format!(
            "{key}={raw:?}: expected a boolean"
        ))),
    }
}
