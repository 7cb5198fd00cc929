//! Task executor boundary.
//!
//! A [`TaskExecutor`] performs the actual work for a named step. The core
//! never talks to a model directly; it hands a step name and a parameter map
//! to the executor and receives either structured or raw text output.
//! Timeout and retry policy belong to the executor, see [`TimeoutExecutor`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::{error, warn};

/// Parameters handed to a step.
pub type Parameters = Map<String, Value>;

/// Output returned by an executor for one step.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    /// Already-decoded JSON.
    Structured(Value),
    /// Free text that may embed a JSON object.
    Raw(String),
}

/// Errors surfaced at the executor boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    #[error("step {step} failed: {reason}")]
    Failed { step: String, reason: String },

    #[error("step {step} timed out after {after_ms} ms")]
    Timeout { step: String, after_ms: u64 },

    #[error("executor does not know step {0}")]
    UnknownStep(String),

    #[error("step {step} is missing parameters: {}", missing.join(", "))]
    MissingParameters { step: String, missing: Vec<String> },

    #[error("step {step} panicked: {reason}")]
    Panicked { step: String, reason: String },
}

impl ExecutorError {
    pub fn failed(step: &str, reason: impl std::fmt::Display) -> Self {
        ExecutorError::Failed {
            step: step.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// The collaborator that performs a step's work.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, step: &str, params: &Parameters)
        -> Result<TaskOutput, ExecutorError>;
}

/// Call `executor` for `step`, turning a panic inside the call into
/// [`ExecutorError::Panicked`].
pub async fn execute_guarded(
    executor: &dyn TaskExecutor,
    step: &str,
    params: &Parameters,
) -> Result<TaskOutput, ExecutorError> {
    match AssertUnwindSafe(executor.execute(step, params))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            error!(step = %step, reason = %reason, "executor panicked");
            Err(ExecutorError::Panicked {
                step: step.to_string(),
                reason,
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Decorator that bounds every call to the wrapped executor.
pub struct TimeoutExecutor {
    inner: Arc<dyn TaskExecutor>,
    timeout: Duration,
}

impl TimeoutExecutor {
    pub fn new(inner: Arc<dyn TaskExecutor>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Wrap `inner` when `timeout` is non-zero, otherwise return it unchanged.
    pub fn wrap(inner: Arc<dyn TaskExecutor>, timeout: Duration) -> Arc<dyn TaskExecutor> {
        if timeout.is_zero() {
            inner
        } else {
            Arc::new(Self::new(inner, timeout))
        }
    }
}

#[async_trait]
impl TaskExecutor for TimeoutExecutor {
    async fn execute(
        &self,
        step: &str,
        params: &Parameters,
    ) -> Result<TaskOutput, ExecutorError> {
        match tokio::time::timeout(self.timeout, self.inner.execute(step, params)).await {
            Ok(result) => result,
            Err(_) => {
                let after_ms = self.timeout.as_millis() as u64;
                warn!(step = %step, after_ms, "step timed out at executor boundary");
                Err(ExecutorError::Timeout {
                    step: step.to_string(),
                    after_ms,
                })
            }
        }
    }
}
