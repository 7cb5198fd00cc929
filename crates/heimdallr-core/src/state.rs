//! Per-run diagnosis state.
//!
//! One `DiagnosisState` exists per run. Only the coordinator writes to it,
//! and only between level barriers, so parameter derivation for level `i`
//! always reads results from levels `< i`.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::domain::category::Category;
use crate::domain::classification::ClassificationResult;
use crate::domain::result::AnalysisResult;

/// Coordinator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Classifying,
    Routing,
    ExecutingLevel(usize),
    Aggregating,
    Done,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Classifying => write!(f, "classifying"),
            RunPhase::Routing => write!(f, "routing"),
            RunPhase::ExecutingLevel(idx) => write!(f, "executing_level({idx})"),
            RunPhase::Aggregating => write!(f, "aggregating"),
            RunPhase::Done => write!(f, "done"),
        }
    }
}

/// Snapshot of run progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub workflow: String,
    pub completed_count: usize,
    pub failed_count: usize,
    pub result_count: usize,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisState {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub input_text: String,
    pub classification: Option<ClassificationResult>,
    /// Label of the workflow template being executed.
    pub workflow: String,
    pub phase: RunPhase,

    pub ticket_ids: Vec<String>,
    pub alert_info: Map<String, Value>,
    pub log_search_hints: Map<String, Value>,

    results: BTreeMap<String, AnalysisResult>,
    completed: Vec<String>,
    failed: Vec<String>,

    /// Planning anomalies, such as a dependency cycle flushed as one level.
    pub plan_warnings: Vec<String>,
    pub final_report: String,
    pub total_duration: Duration,
}

impl DiagnosisState {
    pub fn new(input_text: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            input_text: input_text.into(),
            classification: None,
            workflow: String::new(),
            phase: RunPhase::Classifying,
            ticket_ids: Vec::new(),
            alert_info: Map::new(),
            log_search_hints: Map::new(),
            results: BTreeMap::new(),
            completed: Vec::new(),
            failed: Vec::new(),
            plan_warnings: Vec::new(),
            final_report: String::new(),
            total_duration: Duration::ZERO,
        }
    }

    /// Store the classification and derive the context later steps read.
    pub fn apply_classification(&mut self, classification: ClassificationResult) {
        let extracted = &classification.extracted;
        self.workflow = classification.category.as_str().to_string();
        self.ticket_ids = classification.ticket_ids();

        if matches!(classification.category, Category::Alert | Category::Hybrid) {
            self.alert_info.insert(
                "severity_hints".to_string(),
                list_or_empty(extracted.get("severity_indicators")),
            );
            self.alert_info.insert(
                "matched_keywords".to_string(),
                list_or_empty(extracted.get("matched_keywords")),
            );
            self.alert_info.insert(
                "alert_score".to_string(),
                extracted.get("alert_score").cloned().unwrap_or(json!(0.0)),
            );
        }

        if matches!(classification.category, Category::LogQuery | Category::Hybrid) {
            self.log_search_hints.insert(
                "target_applications".to_string(),
                list_or_empty(extracted.get("application_names")),
            );
            self.log_search_hints.insert(
                "suggested_queries".to_string(),
                list_or_empty(extracted.get("log_keywords")),
            );
            self.log_search_hints.insert(
                "log_score".to_string(),
                extracted.get("log_score").cloned().unwrap_or(json!(0.0)),
            );
        }

        self.classification = Some(classification);
    }

    pub fn category(&self) -> Category {
        self.classification
            .as_ref()
            .map(|c| c.category)
            .unwrap_or(Category::Unknown)
    }

    pub fn primary_ticket(&self) -> Option<&str> {
        self.ticket_ids.first().map(String::as_str)
    }

    /// Record a step outcome. Recording the same step again replaces the
    /// earlier outcome.
    pub fn record_result(&mut self, name: &str, result: AnalysisResult) {
        self.completed.retain(|s| s != name);
        self.failed.retain(|s| s != name);
        if result.success {
            self.completed.push(name.to_string());
        } else {
            self.failed.push(name.to_string());
        }
        self.results.insert(name.to_string(), result);
    }

    pub fn get_result(&self, name: &str) -> Option<&AnalysisResult> {
        self.results.get(name)
    }

    /// Payload of `name` if it succeeded.
    pub fn successful_payload(&self, name: &str) -> Option<&Map<String, Value>> {
        self.results
            .get(name)
            .filter(|r| r.success)
            .map(|r| &r.payload)
    }

    /// Every successful payload keyed by step name.
    pub fn successful_payloads(&self) -> Map<String, Value> {
        self.results
            .iter()
            .filter(|(_, r)| r.success)
            .map(|(name, r)| (name.clone(), r.payload_value()))
            .collect()
    }

    pub fn results(&self) -> &BTreeMap<String, AnalysisResult> {
        &self.results
    }

    /// Completed step names in completion order.
    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    /// Failed step names in completion order.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn progress(&self) -> Progress {
        Progress {
            workflow: self.workflow.clone(),
            completed_count: self.completed.len(),
            failed_count: self.failed.len(),
            result_count: self.results.len(),
            category: self.classification.as_ref().map(|c| c.category),
        }
    }
}

fn list_or_empty(value: Option<&Value>) -> Value {
    match value {
        Some(v @ Value::Array(_)) => v.clone(),
        _ => Value::Array(Vec::new()),
    }
}
