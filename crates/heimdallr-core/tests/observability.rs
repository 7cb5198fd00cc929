//! Structured lifecycle events emitted during a diagnosis run.

use std::sync::Arc;

use heimdallr_core::fakes::ScriptedExecutor;
use heimdallr_core::obs::{
    emit_level_started, emit_run_failed, emit_run_finished, emit_run_started, emit_step_finished,
    RunSpan,
};
use heimdallr_core::workflow::steps::TICKET_CATEGORIZATION;
use heimdallr_core::{DiagnosisFlow, HeimdallrConfig, HeimdallrError};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_run_started_logs_run_id() {
    emit_run_started("run-123", 42);
    assert!(logs_contain("run.started"));
    assert!(logs_contain("run-123"));
}

#[traced_test]
#[test]
fn test_emit_level_and_step_events() {
    emit_level_started(1, &["alert_triage".to_string()]);
    emit_step_finished("alert_triage", 15, false);
    assert!(logs_contain("level.started"));
    assert!(logs_contain("step.finished"));
    assert!(logs_contain("success=false"));
}

#[traced_test]
#[test]
fn test_emit_run_finished_and_failed() {
    emit_run_finished("run-456", 5000, 9, 1);
    emit_run_failed("run-789", &HeimdallrError::Coordination("lost results".to_string()));
    assert!(logs_contain("run.finished"));
    assert!(logs_contain("run.failed"));
    assert!(logs_contain("lost results"));
}

#[traced_test]
#[test]
fn test_run_span_enter_tags_events() {
    let span = RunSpan::new("span-run-1");
    {
        let _guard = span.enter();
        tracing::info!("inside run span");
    }
    assert!(logs_contain("span-run-1"));
}

#[traced_test]
#[tokio::test]
async fn test_full_run_emits_lifecycle_in_run_span() {
    let exec = Arc::new(ScriptedExecutor::new().failing_step(TICKET_CATEGORIZATION));
    let flow = DiagnosisFlow::new(exec, &HeimdallrConfig::default());
    let state = flow.run("PROJ-11").await;

    assert!(logs_contain("run.started"));
    assert!(logs_contain("classification.completed"));
    assert!(logs_contain("level.started"));
    assert!(logs_contain("run.finished"));
    assert!(logs_contain(&state.run_id));
}
