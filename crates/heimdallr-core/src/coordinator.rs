//! Level-by-level execution of a workflow plan.
//!
//! Parameters for every step in a level are derived before anything in that
//! level is dispatched. Multi-step levels run on spawned tasks bounded by a
//! semaphore; workers send their `AnalysisResult` back over a channel and
//! only the coordinator writes to the state. The coordinator joins every
//! task of a level before moving on, so a failed or panicked step never
//! blocks its siblings or the next level.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::error::{HeimdallrError, Result};
use crate::domain::result::AnalysisResult;
use crate::executor::{execute_guarded, Parameters, TaskExecutor};
use crate::obs;
use crate::params::derive_parameters;
use crate::response::normalize_output;
use crate::state::{DiagnosisState, RunPhase};
use crate::workflow::steps::{validate_params, StepExecution};
use crate::workflow::{ExecutionPlan, WorkflowCatalog};

pub const DEFAULT_MAX_PARALLELISM: usize = 3;

/// A step ready for the executor.
#[derive(Debug, Clone)]
struct StepJob {
    name: String,
    params: Parameters,
}

/// Outcome of preparing a step: either already settled or ready to dispatch.
enum Prepared {
    Settled(AnalysisResult),
    Dispatch(StepJob),
}

pub struct ExecutionCoordinator {
    catalog: Arc<WorkflowCatalog>,
    executor: Arc<dyn TaskExecutor>,
    max_parallelism: usize,
}

impl ExecutionCoordinator {
    pub fn new(catalog: Arc<WorkflowCatalog>, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            catalog,
            executor,
            max_parallelism: DEFAULT_MAX_PARALLELISM,
        }
    }

    /// Cap on concurrently running steps within one level. Zero is treated
    /// as one.
    pub fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism.max(1);
        self
    }

    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    /// Select the template for the state's category, plan it and run it.
    #[instrument(skip_all, fields(workflow = %state.workflow))]
    pub async fn execute(&self, state: &mut DiagnosisState) -> Result<ExecutionPlan> {
        state.phase = RunPhase::Routing;
        let plan = self.catalog.plan_for(state.category());
        if let Some(idx) = plan.forced_level {
            state.plan_warnings.push(format!(
                "dependency cycle: level {idx} was forced with steps {:?}",
                plan.levels[idx]
            ));
        }
        info!(
            steps = plan.step_count(),
            levels = plan.levels.len(),
            "workflow planned"
        );

        self.execute_plan(&plan, state).await?;
        state.phase = RunPhase::Aggregating;
        Ok(plan)
    }

    /// Run `plan` level by level, recording every step outcome in `state`.
    pub async fn execute_plan(&self, plan: &ExecutionPlan, state: &mut DiagnosisState) -> Result<()> {
        for (idx, level) in plan.levels.iter().enumerate() {
            state.phase = RunPhase::ExecutingLevel(idx);
            obs::emit_level_started(idx, level);

            let results = self.run_level(idx, level, state).await?;
            for result in results {
                let name = result.step_name.clone();
                state.record_result(&name, result);
            }
        }
        Ok(())
    }

    /// Run one level against a read-only view of the state. Results come
    /// back in the level's step order.
    #[instrument(skip(self, steps, state), fields(size = steps.len()))]
    async fn run_level(
        &self,
        level: usize,
        steps: &[String],
        state: &DiagnosisState,
    ) -> Result<Vec<AnalysisResult>> {
        let mut results = Vec::with_capacity(steps.len());
        let mut jobs = Vec::new();
        for name in steps {
            match self.prepare(name, state)? {
                Prepared::Settled(result) => results.push(result),
                Prepared::Dispatch(job) => jobs.push(job),
            }
        }

        match jobs.len() {
            0 => {}
            1 => {
                let job = jobs.remove(0);
                results.push(run_step(self.executor.as_ref(), job).await);
            }
            _ => results.extend(self.dispatch_parallel(jobs).await),
        }

        if results.len() != steps.len() {
            return Err(HeimdallrError::Coordination(format!(
                "level {level} produced {} results for {} steps",
                results.len(),
                steps.len()
            )));
        }
        results.sort_by_key(|r| steps.iter().position(|s| *s == r.step_name));
        Ok(results)
    }

    /// Resolve what a step needs before dispatch. Unknown steps, local
    /// steps and steps with missing parameters settle here.
    fn prepare(&self, name: &str, state: &DiagnosisState) -> Result<Prepared> {
        let Some(def) = self.catalog.step(name) else {
            warn!(step = %name, "step not in catalog");
            return Ok(Prepared::Settled(AnalysisResult::failed(
                name,
                HeimdallrError::UnknownStep(name.to_string()),
                Duration::ZERO,
            )));
        };

        if def.execution == StepExecution::Local {
            let result = match &state.classification {
                Some(classification) => match serde_json::to_value(classification)? {
                    Value::Object(payload) => {
                        AnalysisResult::succeeded(name, payload, Duration::ZERO)
                    }
                    _ => AnalysisResult::failed(name, "classification is not an object", Duration::ZERO),
                },
                None => AnalysisResult::failed(name, "no classification available", Duration::ZERO),
            };
            return Ok(Prepared::Settled(result));
        }

        let params = derive_parameters(name, state);
        if let Err(e) = validate_params(def, &params) {
            warn!(step = %name, error = %e, "skipping step with missing parameters");
            obs::emit_step_finished(name, 0, false);
            return Ok(Prepared::Settled(AnalysisResult::failed(name, e, Duration::ZERO)));
        }

        Ok(Prepared::Dispatch(StepJob {
            name: name.to_string(),
            params,
        }))
    }

    /// Run `jobs` concurrently, at most `min(jobs, max_parallelism)` at a
    /// time, and wait for all of them.
    async fn dispatch_parallel(&self, jobs: Vec<StepJob>) -> Vec<AnalysisResult> {
        let workers = jobs.len().min(self.max_parallelism);
        debug!(jobs = jobs.len(), workers, "dispatching level in parallel");

        let sem = Arc::new(Semaphore::new(workers));
        // Capacity covers every job so workers never wait on the receiver.
        let (tx, mut rx) = mpsc::channel::<AnalysisResult>(jobs.len());

        let mut names = Vec::with_capacity(jobs.len());
        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            names.push(job.name.clone());
            let sem = Arc::clone(&sem);
            let tx = tx.clone();
            let executor = Arc::clone(&self.executor);

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                let result = run_step(executor.as_ref(), job).await;
                let _ = tx.send(result).await;
            }));
        }
        drop(tx);

        let joined = join_all(handles).await;

        let mut results = Vec::with_capacity(names.len());
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        for (name, outcome) in names.into_iter().zip(joined) {
            if let Err(e) = outcome {
                if results.iter().any(|r| r.step_name == name) {
                    continue;
                }
                error!(step = %name, error = %e, "step task aborted");
                obs::emit_step_finished(&name, 0, false);
                results.push(AnalysisResult::failed(
                    name,
                    format!("step task aborted: {e}"),
                    Duration::ZERO,
                ));
            }
        }
        results
    }
}

/// Call the executor for one step. Executor errors become failed results.
async fn run_step(executor: &dyn TaskExecutor, job: StepJob) -> AnalysisResult {
    let started = Instant::now();
    let outcome = execute_guarded(executor, &job.name, &job.params).await;
    let elapsed = started.elapsed();

    let result = match outcome {
        Ok(output) => AnalysisResult::succeeded(&job.name, normalize_output(output), elapsed),
        Err(e) => {
            warn!(step = %job.name, error = %e, "step failed");
            AnalysisResult::failed(&job.name, e, elapsed)
        }
    };
    obs::emit_step_finished(&job.name, elapsed.as_millis() as u64, result.success);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    use crate::domain::category::Category;
    use crate::domain::classification::ClassificationResult;
    use crate::fakes::ScriptedExecutor;
    use crate::workflow::steps::*;

    fn coordinator(exec: Arc<dyn TaskExecutor>) -> ExecutionCoordinator {
        ExecutionCoordinator::new(Arc::new(WorkflowCatalog::standard()), exec)
    }

    fn plan(levels: &[&[&str]]) -> ExecutionPlan {
        ExecutionPlan {
            levels: levels
                .iter()
                .map(|l| l.iter().map(|s| s.to_string()).collect())
                .collect(),
            forced_level: None,
        }
    }

    fn classified(text: &str, category: Category) -> DiagnosisState {
        let mut state = DiagnosisState::new(text);
        state.apply_classification(ClassificationResult::new(category, 0.9, Map::new(), "rules"));
        state
    }

    #[tokio::test]
    async fn test_local_classification_step_skips_executor() {
        let exec = Arc::new(ScriptedExecutor::new());
        let mut state = classified("disk full", Category::Alert);
        coordinator(exec.clone())
            .execute_plan(&plan(&[&[INPUT_CLASSIFICATION]]), &mut state)
            .await
            .unwrap();

        assert_eq!(exec.total_calls(), 0);
        let payload = state.successful_payload(INPUT_CLASSIFICATION).unwrap();
        assert_eq!(payload["category"], json!("alert"));
    }

    #[tokio::test]
    async fn test_failing_sibling_does_not_block_level_or_next_level() {
        let exec = Arc::new(ScriptedExecutor::new().failing_step(ALERT_TRIAGE));
        let mut state = classified("OPS-1 payments down", Category::Hybrid);
        state.ticket_ids = vec!["OPS-1".to_string()];

        coordinator(exec.clone())
            .execute_plan(
                &plan(&[
                    &[ALERT_TRIAGE, TICKET_BASIC_INFO, LOG_SEARCH_EXECUTION],
                    &[TIMELINE_RECONSTRUCTION],
                ]),
                &mut state,
            )
            .await
            .unwrap();

        assert_eq!(state.failed(), &[ALERT_TRIAGE.to_string()]);
        assert!(state.completed().contains(&TICKET_BASIC_INFO.to_string()));
        assert!(state.completed().contains(&LOG_SEARCH_EXECUTION.to_string()));
        assert!(state.completed().contains(&TIMELINE_RECONSTRUCTION.to_string()));

        let timeline = exec.last_params(TIMELINE_RECONSTRUCTION).unwrap();
        let all_data = timeline["all_data"].as_object().unwrap();
        assert!(all_data.contains_key(TICKET_BASIC_INFO));
        assert!(!all_data.contains_key(ALERT_TRIAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallelism_is_capped() {
        let exec = Arc::new(ScriptedExecutor::new().with_delay(Duration::from_millis(50)));
        let mut state = classified("x", Category::LogQuery);
        coordinator(exec.clone())
            .with_max_parallelism(2)
            .execute_plan(
                &plan(&[&[
                    LOG_PATTERN_ANALYSIS,
                    LOG_ANOMALY_DETECTION,
                    LOG_CORRELATION_ANALYSIS,
                ]]),
                &mut state,
            )
            .await
            .unwrap();

        assert_eq!(exec.total_calls(), 3);
        assert_eq!(exec.peak_concurrency(), 2);
        assert_eq!(
            state.completed(),
            &[
                LOG_PATTERN_ANALYSIS.to_string(),
                LOG_ANOMALY_DETECTION.to_string(),
                LOG_CORRELATION_ANALYSIS.to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_parameters_fail_without_executor_call() {
        let exec = Arc::new(ScriptedExecutor::new());
        let mut state = classified("no ticket here", Category::Ticket);
        coordinator(exec.clone())
            .execute_plan(&plan(&[&[TICKET_BASIC_INFO]]), &mut state)
            .await
            .unwrap();

        assert_eq!(exec.total_calls(), 0);
        let result = state.get_result(TICKET_BASIC_INFO).unwrap();
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("issue_key"));
    }

    #[tokio::test]
    async fn test_unknown_step_is_recorded_as_failed() {
        let exec = Arc::new(ScriptedExecutor::new());
        let mut state = classified("x", Category::Alert);
        coordinator(exec.clone())
            .execute_plan(&plan(&[&["made_up_step", ALERT_TRIAGE]]), &mut state)
            .await
            .unwrap();

        assert_eq!(state.failed(), &["made_up_step".to_string()]);
        assert_eq!(state.completed(), &[ALERT_TRIAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_panicking_step_in_parallel_level_becomes_failed_result() {
        let exec = Arc::new(ScriptedExecutor::new().panicking_step(LOG_ANOMALY_DETECTION));
        let mut state = classified("x", Category::LogQuery);
        coordinator(exec)
            .execute_plan(
                &plan(&[&[LOG_PATTERN_ANALYSIS, LOG_ANOMALY_DETECTION]]),
                &mut state,
            )
            .await
            .unwrap();

        let failed = state.get_result(LOG_ANOMALY_DETECTION).unwrap();
        assert!(!failed.success);
        assert!(failed.error.as_deref().unwrap().contains("panicked"));
        assert!(state.successful_payload(LOG_PATTERN_ANALYSIS).is_some());
    }

    #[tokio::test]
    async fn test_panicking_step_in_single_step_level_becomes_failed_result() {
        let exec = Arc::new(ScriptedExecutor::new().panicking_step(LOG_SEARCH_EXECUTION));
        let mut state = classified("grep the logs", Category::LogQuery);
        coordinator(exec.clone())
            .execute_plan(
                &plan(&[&[LOG_SEARCH_EXECUTION], &[LOG_PATTERN_ANALYSIS]]),
                &mut state,
            )
            .await
            .unwrap();

        let failed = state.get_result(LOG_SEARCH_EXECUTION).unwrap();
        assert!(!failed.success);
        assert!(failed
            .error
            .as_deref()
            .unwrap()
            .contains("scripted panic in log_search_execution"));
        assert_eq!(state.completed(), &[LOG_PATTERN_ANALYSIS.to_string()]);
        assert_eq!(exec.call_count(LOG_PATTERN_ANALYSIS), 1);
    }

    #[tokio::test]
    async fn test_execute_routes_by_category_and_reaches_aggregating() {
        let exec = Arc::new(ScriptedExecutor::new());
        let mut state = classified("grep the logs", Category::LogQuery);
        let plan = coordinator(exec.clone()).execute(&mut state).await.unwrap();

        assert_eq!(state.phase, RunPhase::Aggregating);
        assert_eq!(plan.step_count(), 10);
        assert_eq!(state.results().len(), 10);
        assert!(state.failed().is_empty());
        assert!(state.plan_warnings.is_empty());
        assert_eq!(exec.call_count(ALERT_TRIAGE), 0);
    }
}
