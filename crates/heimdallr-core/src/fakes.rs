//! In-memory executor fake (testing only)
//!
//! `ScriptedExecutor` answers each step with a canned response, fails the
//! steps it is told to fail, and records every call it receives so tests can
//! assert on call counts, parameters and peak concurrency.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::executor::{ExecutorError, Parameters, TaskExecutor, TaskOutput};

/// Scripted [`TaskExecutor`].
///
/// Steps without a scripted response answer with
/// `{"step": <name>, "status": "ok"}`.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: HashMap<String, TaskOutput>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    params: Mutex<HashMap<String, Parameters>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, step: &str, output: TaskOutput) -> Self {
        self.responses.insert(step.to_string(), output);
        self
    }

    pub fn with_json(self, step: &str, value: Value) -> Self {
        self.with_response(step, TaskOutput::Structured(value))
    }

    pub fn with_raw(self, step: &str, text: &str) -> Self {
        self.with_response(step, TaskOutput::Raw(text.to_string()))
    }

    /// Make every call to `step` fail.
    pub fn failing_step(mut self, step: &str) -> Self {
        self.failing.insert(step.to_string());
        self
    }

    /// Make every call to `step` panic.
    pub fn panicking_step(mut self, step: &str) -> Self {
        self.panicking.insert(step.to_string());
        self
    }

    /// Hold each call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Step names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, step: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|s| *s == step).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Parameters of the most recent call to `step`.
    pub fn last_params(&self, step: &str) -> Option<Parameters> {
        self.params.lock().unwrap().get(step).cloned()
    }

    /// Highest number of calls observed in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        step: &str,
        params: &Parameters,
    ) -> Result<TaskOutput, ExecutorError> {
        self.calls.lock().unwrap().push(step.to_string());
        self.params
            .lock()
            .unwrap()
            .insert(step.to_string(), params.clone());
        if self.panicking.contains(step) {
            panic!("scripted panic in {step}");
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(step) {
            return Err(ExecutorError::failed(step, "scripted failure"));
        }
        Ok(self
            .responses
            .get(step)
            .cloned()
            .unwrap_or_else(|| TaskOutput::Structured(json!({"step": step, "status": "ok"}))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses_and_failures() {
        let exec = ScriptedExecutor::new()
            .with_raw("a", "hello")
            .failing_step("b");

        let a = exec.execute("a", &Parameters::new()).await.unwrap();
        assert_eq!(a, TaskOutput::Raw("hello".to_string()));
        assert!(exec.execute("b", &Parameters::new()).await.is_err());
        let c = exec.execute("c", &Parameters::new()).await.unwrap();
        assert_eq!(c, TaskOutput::Structured(json!({"step": "c", "status": "ok"})));

        assert_eq!(exec.calls(), vec!["a", "b", "c"]);
        assert_eq!(exec.call_count("b"), 1);
        assert_eq!(exec.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_records_last_params() {
        let exec = ScriptedExecutor::new();
        let mut params = Parameters::new();
        params.insert("k".to_string(), json!("v"));
        exec.execute("s", &params).await.unwrap();
        assert_eq!(exec.last_params("s").unwrap()["k"], json!("v"));
        assert!(exec.last_params("other").is_none());
    }
}
