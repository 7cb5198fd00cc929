//! Per-step analysis outcome.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The outcome of one executed step. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub step_name: String,
    pub payload: Map<String, Value>,
    pub duration: Duration,
    pub success: bool,
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn succeeded(
        step_name: impl Into<String>,
        payload: Map<String, Value>,
        duration: Duration,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            payload,
            duration,
            success: true,
            error: None,
        }
    }

    pub fn failed(
        step_name: impl Into<String>,
        error: impl std::fmt::Display,
        duration: Duration,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            payload: Map::new(),
            duration,
            success: false,
            error: Some(error.to_string()),
        }
    }

    /// Payload as a JSON object value.
    pub fn payload_value(&self) -> Value {
        Value::Object(self.payload.clone())
    }
}
