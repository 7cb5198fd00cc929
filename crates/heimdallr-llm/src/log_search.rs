//! Log search through the `/openapi/v2/search/jobs` API.
//!
//! A search is a job: POST creates it, a blocking GET on the job id waits for
//! the result. Only the first [`MAX_ENTRIES`] entries are kept.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::parse;
use crate::error::LlmError;
use crate::Result;

/// Entries kept from a finished job.
pub const MAX_ENTRIES: usize = 10;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_WINDOW_HOURS: i64 = 1;

/// Host and key for [`LogSearchClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogSearchConfig {
    pub host: String,
    pub api_key: String,
    /// Covers the blocking result request, so longer than a chat call.
    pub timeout_secs: u64,
}

impl LogSearchConfig {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into().trim().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read `LOG_SEARCH_API_HOST`, `LOG_SEARCH_API_KEY` and
    /// `LOG_SEARCH_TIMEOUT`.
    ///
    /// `Ok(None)` when no host is configured.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(host) = lookup("LOG_SEARCH_API_HOST").filter(|h| !h.trim().is_empty()) else {
            return Ok(None);
        };
        let api_key = lookup("LOG_SEARCH_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingSetting("LOG_SEARCH_API_KEY"))?;
        let mut config = Self::new(host, api_key);
        if let Some(v) = parse(&lookup, "LOG_SEARCH_TIMEOUT")? {
            config.timeout_secs = v;
        }
        Ok(Some(config))
    }

    pub fn jobs_url(&self) -> String {
        format!("{}/openapi/v2/search/jobs", self.host)
    }
}

/// Body of the job-creation request. Times are epoch milliseconds as
/// strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchJob {
    pub applications: Vec<String>,
    pub query: String,
    pub start_time: String,
    pub end_time: String,
}

impl SearchJob {
    /// Build from step parameters, defaulting to the hour before `now`.
    ///
    /// `applications` may be an array or a single string.
    pub fn from_params(params: &serde_json::Map<String, Value>, now: DateTime<Utc>) -> Self {
        let applications = match params.get("applications") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(app)) => vec![app.clone()],
            _ => Vec::new(),
        };
        let query = params
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let end_time = time_param(params, "end_time")
            .unwrap_or_else(|| now.timestamp_millis().to_string());
        let start_time = time_param(params, "start_time").unwrap_or_else(|| {
            let start = now - chrono::Duration::hours(DEFAULT_WINDOW_HOURS);
            start.timestamp_millis().to_string()
        });
        Self {
            applications,
            query,
            start_time,
            end_time,
        }
    }
}

fn time_param(params: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct JobCreated {
    #[serde(default)]
    id: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResult {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    total_size: Option<u64>,
    #[serde(default)]
    entries: Vec<Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Runs search jobs against the log platform.
pub struct LogSearchClient {
    client: reqwest::Client,
    config: LogSearchConfig,
}

impl LogSearchClient {
    pub fn new(config: LogSearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("heimdallr-llm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LogSearchConfig {
        &self.config
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-openapi-key",
            HeaderValue::from_str(&self.config.api_key)
                .map_err(|e| LlmError::Http(e.to_string()))?,
        );
        Ok(headers)
    }

    /// Create the job, wait for it and return
    /// `{state, totalSize, entries, message}`.
    pub async fn search(&self, job: &SearchJob) -> Result<Value> {
        let jobs_url = self.config.jobs_url();
        debug!(applications = ?job.applications, query = %job.query, "creating log search job");
        let created = self
            .client
            .post(&jobs_url)
            .headers(self.headers()?)
            .json(job)
            .send()
            .await?;
        let id = job_id(&checked_text(created).await?)?;

        debug!(job_id = %id, "waiting for log search job");
        let finished = self
            .client
            .get(format!("{jobs_url}/{id}"))
            .headers(self.headers()?)
            .query(&[("blocking", "true")])
            .send()
            .await?;
        job_summary(&checked_text(finished).await?)
    }
}

async fn checked_text(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(LlmError::Api {
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}

fn job_id(body: &str) -> Result<String> {
    let created: JobCreated = serde_json::from_str(body)?;
    match created.id {
        Some(Value::String(id)) if !id.is_empty() => Ok(id),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(LlmError::MissingJobId),
    }
}

fn job_summary(body: &str) -> Result<Value> {
    let mut result: JobResult = serde_json::from_str(body)?;
    result.entries.truncate(MAX_ENTRIES);
    Ok(json!({
        "state": result.state,
        "totalSize": result.total_size,
        "entries": result.entries,
        "message": result.message,
    }))
}
