//! Data-source steps in front of the chat executor.
//!
//! `ticket_basic_info` and `log_search_execution` fetch real data when their
//! source is configured. Every other step, and these two when their source
//! is absent, go to the wrapped executor.

use std::sync::Arc;

use async_trait::async_trait;
use heimdallr_core::workflow::steps::{LOG_SEARCH_EXECUTION, TICKET_BASIC_INFO};
use heimdallr_core::{ExecutorError, Parameters, TaskExecutor, TaskOutput};
use serde_json::Value;
use tracing::{debug, info};

use crate::jira::{JiraClient, JiraConfig};
use crate::log_search::{LogSearchClient, LogSearchConfig, SearchJob};
use crate::Result;

/// Routes data-source steps to their clients and the rest to `fallback`.
pub struct DataSourceExecutor {
    jira: Option<JiraClient>,
    log_search: Option<LogSearchClient>,
    fallback: Arc<dyn TaskExecutor>,
}

impl DataSourceExecutor {
    pub fn new(fallback: Arc<dyn TaskExecutor>) -> Self {
        Self {
            jira: None,
            log_search: None,
            fallback,
        }
    }

    /// Attach whichever sources the `JIRA_*` and `LOG_SEARCH_*` variables
    /// configure.
    pub fn from_env(fallback: Arc<dyn TaskExecutor>) -> Result<Self> {
        let mut executor = Self::new(fallback);
        if let Some(config) = JiraConfig::from_env()? {
            info!(server = %config.server, "ticket lookups go to Jira");
            executor = executor.with_jira(JiraClient::new(config)?);
        }
        if let Some(config) = LogSearchConfig::from_env()? {
            info!(host = %config.host, "log searches go to the search API");
            executor = executor.with_log_search(LogSearchClient::new(config)?);
        }
        Ok(executor)
    }

    pub fn with_jira(mut self, client: JiraClient) -> Self {
        self.jira = Some(client);
        self
    }

    pub fn with_log_search(mut self, client: LogSearchClient) -> Self {
        self.log_search = Some(client);
        self
    }

    pub fn has_jira(&self) -> bool {
        self.jira.is_some()
    }

    pub fn has_log_search(&self) -> bool {
        self.log_search.is_some()
    }

    async fn fetch_ticket(
        jira: &JiraClient,
        params: &Parameters,
    ) -> std::result::Result<TaskOutput, ExecutorError> {
        let issue_key = params
            .get("issue_key")
            .and_then(Value::as_str)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ExecutorError::MissingParameters {
                step: TICKET_BASIC_INFO.to_string(),
                missing: vec!["issue_key".to_string()],
            })?;
        jira.issue(issue_key)
            .await
            .map(TaskOutput::Structured)
            .map_err(|e| ExecutorError::failed(TICKET_BASIC_INFO, e))
    }

    async fn search_logs(
        logs: &LogSearchClient,
        params: &Parameters,
    ) -> std::result::Result<TaskOutput, ExecutorError> {
        let job = SearchJob::from_params(params, chrono::Utc::now());
        let mut missing = Vec::new();
        if job.applications.is_empty() {
            missing.push("applications".to_string());
        }
        if job.query.trim().is_empty() {
            missing.push("query".to_string());
        }
        if !missing.is_empty() {
            return Err(ExecutorError::MissingParameters {
                step: LOG_SEARCH_EXECUTION.to_string(),
                missing,
            });
        }
        logs.search(&job)
            .await
            .map(TaskOutput::Structured)
            .map_err(|e| ExecutorError::failed(LOG_SEARCH_EXECUTION, e))
    }
}

#[async_trait]
impl TaskExecutor for DataSourceExecutor {
    async fn execute(
        &self,
        step: &str,
        params: &Parameters,
    ) -> std::result::Result<TaskOutput, ExecutorError> {
        match (step, &self.jira, &self.log_search) {
            (TICKET_BASIC_INFO, Some(jira), _) => {
                debug!(step = %step, "answering from Jira");
                Self::fetch_ticket(jira, params).await
            }
            (LOG_SEARCH_EXECUTION, _, Some(logs)) => {
                debug!(step = %step, "answering from log search");
                Self::search_logs(logs, params).await
            }
            _ => self.fallback.execute(step, params).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heimdallr_core::fakes::ScriptedExecutor;
    use heimdallr_core::workflow::steps::ALERT_TRIAGE;
    use serde_json::json;

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    fn unreachable_jira() -> JiraClient {
        JiraClient::new(JiraConfig::new("http://127.0.0.1:9", "t")).unwrap()
    }

    fn unreachable_logs() -> LogSearchClient {
        LogSearchClient::new(LogSearchConfig::new("http://127.0.0.1:9", "k")).unwrap()
    }

    #[tokio::test]
    async fn test_without_sources_every_step_goes_to_fallback() {
        let fake = Arc::new(
            ScriptedExecutor::new()
                .with_json(TICKET_BASIC_INFO, json!({"key": "OPS-1"}))
                .with_json(LOG_SEARCH_EXECUTION, json!({"entries": []})),
        );
        let exec = DataSourceExecutor::new(fake.clone());
        assert!(!exec.has_jira());
        assert!(!exec.has_log_search());

        let ticket = exec
            .execute(TICKET_BASIC_INFO, &params(json!({"issue_key": "OPS-1"})))
            .await
            .unwrap();
        assert_eq!(ticket, TaskOutput::Structured(json!({"key": "OPS-1"})));
        exec.execute(LOG_SEARCH_EXECUTION, &Parameters::new())
            .await
            .unwrap();
        assert_eq!(fake.call_count(TICKET_BASIC_INFO), 1);
        assert_eq!(fake.call_count(LOG_SEARCH_EXECUTION), 1);
    }

    #[tokio::test]
    async fn test_other_steps_still_reach_fallback_when_sources_are_set() {
        let fake =
            Arc::new(ScriptedExecutor::new().with_json(ALERT_TRIAGE, json!({"severity": "High"})));
        let exec = DataSourceExecutor::new(fake.clone())
            .with_jira(unreachable_jira())
            .with_log_search(unreachable_logs());

        exec.execute(ALERT_TRIAGE, &params(json!({"alert_text": "db down"})))
            .await
            .unwrap();
        assert_eq!(fake.calls(), vec![ALERT_TRIAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_ticket_lookup_without_issue_key_is_rejected_locally() {
        let fake = Arc::new(ScriptedExecutor::new());
        let exec = DataSourceExecutor::new(fake.clone()).with_jira(unreachable_jira());

        let err = exec
            .execute(TICKET_BASIC_INFO, &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::MissingParameters { ref missing, .. } if missing == &["issue_key".to_string()]
        ));
        assert_eq!(fake.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_log_search_without_query_is_rejected_locally() {
        let fake = Arc::new(ScriptedExecutor::new());
        let exec = DataSourceExecutor::new(fake.clone()).with_log_search(unreachable_logs());

        let err = exec
            .execute(
                LOG_SEARCH_EXECUTION,
                &params(json!({"applications": ["billing"], "query": " "})),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::MissingParameters { ref missing, .. } if missing == &["query".to_string()]
        ));
        assert_eq!(fake.total_calls(), 0);
    }
}
