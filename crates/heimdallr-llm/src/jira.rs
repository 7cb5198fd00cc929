//! Ticket lookup against a Jira server.
//!
//! Answers `ticket_basic_info` with the issue's key, summary, description,
//! status and priority instead of asking the model to imagine them.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::parse;
use crate::error::LlmError;
use crate::Result;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Server and credentials for [`JiraClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct JiraConfig {
    /// Base URL, e.g. `https://jira.example.com`.
    pub server: String,
    pub access_token: String,
    pub timeout_secs: u64,
}

impl JiraConfig {
    pub fn new(server: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            server: server.into().trim().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read `JIRA_SERVER`, `JIRA_ACCESS_TOKEN` and `JIRA_TIMEOUT`.
    ///
    /// `Ok(None)` when no server is configured.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(server) = lookup("JIRA_SERVER").filter(|s| !s.trim().is_empty()) else {
            return Ok(None);
        };
        let token = lookup("JIRA_ACCESS_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::MissingSetting("JIRA_ACCESS_TOKEN"))?;
        let mut config = Self::new(server, token);
        if let Some(v) = parse(&lookup, "JIRA_TIMEOUT")? {
            config.timeout_secs = v;
        }
        Ok(Some(config))
    }

    pub fn issue_url(&self, issue_key: &str) -> String {
        format!("{}/rest/api/2/issue/{}", self.server, issue_key.trim())
    }
}

#[derive(Debug, Deserialize)]
struct Issue {
    key: String,
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<Named>,
    #[serde(default)]
    priority: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

/// Fetches single issues by key with bearer authentication.
pub struct JiraClient {
    client: reqwest::Client,
    config: JiraConfig,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("heimdallr-llm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &JiraConfig {
        &self.config
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", self.config.access_token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| LlmError::Http(e.to_string()))?,
        );
        Ok(headers)
    }

    /// Issue summary as `{key, summary, description, status, priority}`.
    pub async fn issue(&self, issue_key: &str) -> Result<Value> {
        let url = self.config.issue_url(issue_key);
        debug!(issue_key = %issue_key, url = %url, "fetching ticket");
        let response = self
            .client
            .get(url)
            .headers(self.headers()?)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        issue_summary(&text)
    }
}

fn issue_summary(body: &str) -> Result<Value> {
    let issue: Issue = serde_json::from_str(body)?;
    let fields = issue.fields;
    Ok(json!({
        "key": issue.key,
        "summary": fields.summary.unwrap_or_default(),
        "description": fields.description.unwrap_or_default(),
        "status": fields.status.map(|s| s.name).unwrap_or_else(|| "Unknown".to_string()),
        "priority": fields.priority.map(|p| p.name).unwrap_or_else(|| "None".to_string()),
    }))
}
