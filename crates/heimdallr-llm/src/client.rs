//! HTTP task executor for OpenAI-compatible chat-completions endpoints.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use heimdallr_core::{ExecutorError, Parameters, TaskExecutor, TaskOutput, WorkflowCatalog};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::prompt::{self, RenderedPrompt};
use crate::Result;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Executes catalog steps by prompting a chat model.
pub struct OpenAiExecutor {
    client: reqwest::Client,
    config: LlmConfig,
    catalog: Arc<WorkflowCatalog>,
}

impl OpenAiExecutor {
    pub fn new(config: LlmConfig, catalog: Arc<WorkflowCatalog>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("heimdallr-llm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            config,
            catalog,
        })
    }

    /// Build from environment variables with the standard catalog.
    pub fn from_env() -> Result<Self> {
        Self::new(LlmConfig::from_env()?, Arc::new(WorkflowCatalog::standard()))
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| LlmError::Http(e.to_string()))?,
        );
        if let Some(org) = &self.config.organization {
            headers.insert(
                "openai-organization",
                HeaderValue::from_str(org).map_err(|e| LlmError::Http(e.to_string()))?,
            );
        }
        Ok(headers)
    }

    async fn complete_once(&self, prompt: &RenderedPrompt) -> Result<String> {
        let body = request_body(&self.config, prompt);
        let response = self
            .client
            .post(self.config.endpoint())
            .headers(self.headers()?)
            .json(&body)
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
        parse_completion(&text)
    }

    /// Send `prompt`, retrying transient failures.
    pub async fn complete(&self, step: &str, prompt: &RenderedPrompt) -> Result<String> {
        with_retries(&self.config, step, || self.complete_once(prompt)).await
    }
}

#[async_trait]
impl TaskExecutor for OpenAiExecutor {
    async fn execute(
        &self,
        step: &str,
        params: &Parameters,
    ) -> std::result::Result<TaskOutput, ExecutorError> {
        let def = self
            .catalog
            .step(step)
            .ok_or_else(|| ExecutorError::UnknownStep(step.to_string()))?;
        let prompt = prompt::render(def, params);
        debug!(step = %step, model = %self.config.model, "sending step to chat model");

        self.complete(step, &prompt)
            .await
            .map(TaskOutput::Raw)
            .map_err(|e| ExecutorError::failed(step, e))
    }
}

fn request_body(config: &LlmConfig, prompt: &RenderedPrompt) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: prompt.system.clone(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: prompt.user.clone(),
            },
        ],
        temperature: config.temperature,
    }
}

/// First choice's message content.
fn parse_completion(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(LlmError::EmptyCompletion)
}

/// Run `op` up to `max_retries + 1` times with exponential backoff between
/// retryable failures.
async fn with_retries<F, Fut, T>(config: &LlmConfig, step: &str, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_retries + 1;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && err.is_retryable() => {
                let delay = config.backoff(attempt);
                warn!(
                    step = %step,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "chat completion failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn test_request_body_shape() {
        let config = LlmConfig::new("sk-test").with_model("gpt-4o-mini");
        let prompt = RenderedPrompt {
            system: "sys".to_string(),
            user: "usr".to_string(),
        };
        let body = serde_json::to_value(request_body(&config, &prompt)).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_parse_completion_takes_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"ok\":true}"}},{"message":{"content":"second"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), r#"{"ok":true}"#);
    }

    #[test]
    fn test_parse_completion_rejects_empty() {
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(LlmError::EmptyCompletion)
        ));
        assert!(matches!(
            parse_completion(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(LlmError::EmptyCompletion)
        ));
        assert!(matches!(parse_completion("<html>"), Err(LlmError::Json(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors_then_succeeds() {
        let config = LlmConfig::new("k");
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let out = with_retries(&config, "alert_triage", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(LlmError::Api {
                    status: 503,
                    body: String::new(),
                })
            } else {
                Ok("done")
            }
        })
        .await
        .unwrap();

        assert_eq!(out, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_fails_fast() {
        let config = LlmConfig::new("k");
        let calls = &AtomicU32::new(0);

        let err = with_retries(&config, "alert_triage", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(LlmError::Api {
                status: 401,
                body: "bad key".to_string(),
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 401, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_respected() {
        let mut config = LlmConfig::new("k");
        config.max_retries = 2;
        let calls = &AtomicU32::new(0);

        let result = with_retries(&config, "alert_triage", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(LlmError::Http("connection reset".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unknown_step_is_rejected_before_any_request() {
        let exec = OpenAiExecutor::new(
            LlmConfig::new("k").with_base_url("http://127.0.0.1:9"),
            Arc::new(WorkflowCatalog::standard()),
        )
        .unwrap();
        let err = exec
            .execute("not_a_step", &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::UnknownStep(s) if s == "not_a_step"));
    }
}
