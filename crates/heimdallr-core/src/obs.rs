//! Structured observability hooks for diagnosis run lifecycle events.
//!
//! This module provides:
//! - Run-scoped tracing spans via `RunSpan`
//! - Emission functions for lifecycle events: run start, classification,
//!   level start, step finish, run finish and run failure
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`).

use tracing::info;

use crate::domain::category::Category;

/// Run-scoped tracing span tagged with the run_id.
///
/// Synchronous code enters it as an RAII guard; async code attaches it to the
/// run future, since an entered guard must not be held across `.await`.
///
/// # Example
///
/// ```ignore
/// let span = RunSpan::new("3f0c...");
/// drive(&mut state).instrument(span.span()).await;
/// let _guard = span.enter();
/// ```
#[derive(Debug, Clone)]
pub struct RunSpan {
    span: tracing::Span,
}

impl RunSpan {
    pub fn new(run_id: &str) -> Self {
        Self {
            span: tracing::info_span!("heimdallr.run", run_id = %run_id),
        }
    }

    /// Handle for `tracing::Instrument::instrument`.
    pub fn span(&self) -> tracing::Span {
        self.span.clone()
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, input_chars: usize) {
    info!(event = "run.started", run_id = %run_id, input_chars = input_chars);
}

/// Emit event: classification finished.
pub fn emit_classification_completed(run_id: &str, category: Category, confidence: f64) {
    info!(
        event = "classification.completed",
        run_id = %run_id,
        category = %category,
        confidence = confidence,
    );
}

/// Emit event: a level is about to be dispatched.
pub fn emit_level_started(level: usize, steps: &[String]) {
    info!(event = "level.started", level = level, steps = ?steps);
}

/// Emit event: one step finished, successfully or not.
pub fn emit_step_finished(step: &str, duration_ms: u64, success: bool) {
    info!(
        event = "step.finished",
        step = %step,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: run finished with duration and step counts.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, completed: usize, failed: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        completed = completed,
        failed = failed,
    );
}

/// Emit event: the level loop aborted (warning level).
pub fn emit_run_failed(run_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "run.failed", run_id = %run_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let span = RunSpan::new("test-run-id");
        let _guard = span.enter();
        emit_run_started("test-run-id", 12);
        emit_level_started(0, &["input_classification".to_string()]);
    }
}
