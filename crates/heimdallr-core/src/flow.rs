//! Top-level diagnosis run: classify, route, execute, aggregate.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::Instrument;

use crate::classify::{Classifier, PatternExtractor};
use crate::config::HeimdallrConfig;
use crate::coordinator::ExecutionCoordinator;
use crate::domain::classification::ClassificationResult;
use crate::executor::{TaskExecutor, TimeoutExecutor};
use crate::obs::{self, RunSpan};
use crate::report;
use crate::state::{DiagnosisState, RunPhase};
use crate::workflow::WorkflowCatalog;

/// One configured diagnosis pipeline. Cheap to share; every call to
/// [`run`](Self::run) owns its own state.
pub struct DiagnosisFlow {
    classifier: Classifier,
    extractor: Option<PatternExtractor>,
    coordinator: ExecutionCoordinator,
}

impl DiagnosisFlow {
    pub fn new(executor: Arc<dyn TaskExecutor>, config: &HeimdallrConfig) -> Self {
        Self::with_catalog(executor, config, Arc::new(WorkflowCatalog::standard()))
    }

    pub fn with_catalog(
        executor: Arc<dyn TaskExecutor>,
        config: &HeimdallrConfig,
        catalog: Arc<WorkflowCatalog>,
    ) -> Self {
        let executor = TimeoutExecutor::wrap(executor, config.step_timeout());
        let classifier =
            Classifier::new(Arc::clone(&executor)).with_threshold(config.escalation_threshold);
        let extractor = config
            .pattern_extraction
            .then(|| PatternExtractor::new(Arc::clone(&executor)));
        let coordinator = ExecutionCoordinator::new(catalog, executor)
            .with_max_parallelism(config.max_parallelism);

        Self {
            classifier,
            extractor,
            coordinator,
        }
    }

    pub fn catalog(&self) -> &WorkflowCatalog {
        self.coordinator.catalog()
    }

    /// Classify `text`, enriching the result with extracted patterns when
    /// extraction is enabled. Never fails.
    pub async fn classify(&self, text: &str) -> ClassificationResult {
        let mut classification = self.classifier.classify(text).await;
        if let Some(extractor) = &self.extractor {
            let found = extractor.extract(text, &classification).await;
            classification.merge_extracted(
                found
                    .into_iter()
                    .filter(|(_, v)| !is_blank(v))
                    .collect(),
            );
        }
        classification
    }

    /// Run a full diagnosis. Never fails: step failures are recorded in the
    /// state and a failed level loop yields a failure report.
    pub async fn run(&self, text: &str) -> DiagnosisState {
        let mut state = DiagnosisState::new(text);
        let span = RunSpan::new(&state.run_id);
        self.drive(&mut state).instrument(span.span()).await;
        state
    }

    async fn drive(&self, state: &mut DiagnosisState) {
        let started = Instant::now();
        obs::emit_run_started(&state.run_id, state.input_text.chars().count());

        state.phase = RunPhase::Classifying;
        let classification = self.classify(&state.input_text).await;
        obs::emit_classification_completed(
            &state.run_id,
            classification.category,
            classification.confidence,
        );
        state.apply_classification(classification);

        let outcome = self.coordinator.execute(state).await;
        state.total_duration = started.elapsed();
        match outcome {
            Ok(_) => {
                state.final_report = report::final_report(state);
                obs::emit_run_finished(
                    &state.run_id,
                    state.total_duration.as_millis() as u64,
                    state.completed().len(),
                    state.failed().len(),
                );
            }
            Err(e) => {
                obs::emit_run_failed(&state.run_id, &e);
                state.final_report = report::failure_report(state, &e);
            }
        }
        state.phase = RunPhase::Done;
    }
}

/// Extraction values that carry nothing and must not mask rule-stage keys.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::domain::category::Category;
    use crate::fakes::ScriptedExecutor;
    use crate::workflow::steps::*;

    #[tokio::test]
    async fn test_extraction_adds_keys_without_masking_rule_ticket_ids() {
        let exec = Arc::new(ScriptedExecutor::new().with_json(
            PATTERN_EXTRACTION,
            json!({"ticket_ids": [], "version_numbers": ["1.2.0"]}),
        ));
        let flow = DiagnosisFlow::new(exec, &HeimdallrConfig::default());
        let result = flow.classify("PROJ-123").await;

        assert_eq!(result.category, Category::Ticket);
        assert_eq!(result.confidence, 0.95);
        assert_eq!(result.ticket_ids(), vec!["PROJ-123"]);
        assert_eq!(result.extracted["version_numbers"], json!(["1.2.0"]));
    }

    #[tokio::test]
    async fn test_extraction_disabled_makes_no_call() {
        let exec = Arc::new(ScriptedExecutor::new());
        let config = HeimdallrConfig {
            pattern_extraction: false,
            ..Default::default()
        };
        let flow = DiagnosisFlow::new(exec.clone(), &config);
        flow.classify("PROJ-123").await;
        assert_eq!(exec.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_run_reaches_done_with_report() {
        let exec = Arc::new(
            ScriptedExecutor::new()
                .with_json(COMPREHENSIVE_REPORT, json!({"report": "# All clear"})),
        );
        let flow = DiagnosisFlow::new(exec, &HeimdallrConfig::default());
        let state = flow.run("PROJ-77").await;

        assert_eq!(state.phase, RunPhase::Done);
        assert_eq!(state.workflow, "ticket");
        assert_eq!(state.final_report, "# All clear");
        assert!(state.failed().is_empty());
        assert_eq!(state.completed().len(), 10);
    }

    #[tokio::test]
    async fn test_panics_in_classification_and_single_step_level_stay_inside_run() {
        let exec = Arc::new(
            ScriptedExecutor::new()
                .panicking_step(INPUT_CLASSIFICATION)
                .panicking_step(PATTERN_EXTRACTION)
                .panicking_step(LOG_SEARCH_EXECUTION),
        );
        let flow = DiagnosisFlow::new(exec, &HeimdallrConfig::default());
        let state = flow.run("PROJ-9, please search logs for error").await;

        assert_eq!(state.phase, RunPhase::Done);
        assert_eq!(state.category(), Category::Hybrid);
        assert!(state
            .classification
            .as_ref()
            .unwrap()
            .reasoning
            .ends_with("(escalation unavailable)"));
        // log_search_execution is the only dispatched step of the first level.
        let failed = state.get_result(LOG_SEARCH_EXECUTION).unwrap();
        assert!(failed.error.as_deref().unwrap().contains("panicked"));
        assert_eq!(state.failed(), &[LOG_SEARCH_EXECUTION.to_string()]);
        assert!(state.completed().contains(&COMPREHENSIVE_REPORT.to_string()));
        assert!(!state.final_report.is_empty());
    }
}
