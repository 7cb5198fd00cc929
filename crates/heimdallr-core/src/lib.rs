//! Heimdallr Core Library
//!
//! Classifies a diagnostic input (alert text, ticket reference, log query or
//! a mix), selects the workflow template for its category, resolves the
//! template into dependency levels and runs each level against a pluggable
//! [`TaskExecutor`], folding partial results into a [`DiagnosisState`].
//!
//! ```ignore
//! let flow = DiagnosisFlow::new(executor, &HeimdallrConfig::from_env()?);
//! let state = flow.run("PROJ-123, please search logs for error").await;
//! println!("{}", state.final_report);
//! ```

pub mod classify;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod executor;
pub mod fakes;
pub mod flow;
pub mod obs;
pub mod params;
pub mod report;
pub mod response;
pub mod state;
pub mod telemetry;
pub mod workflow;

pub use classify::{
    target_patterns, Classifier, PatternExtractor, RuleClassifier, RuleScores,
    DEFAULT_ESCALATION_THRESHOLD,
};
pub use config::HeimdallrConfig;
pub use coordinator::{ExecutionCoordinator, DEFAULT_MAX_PARALLELISM};
pub use domain::{
    clamp_confidence, AnalysisResult, Category, ClassificationResult, HeimdallrError, Result,
};
pub use executor::{ExecutorError, Parameters, TaskExecutor, TaskOutput, TimeoutExecutor};
pub use flow::DiagnosisFlow;
pub use params::derive_parameters;
pub use state::{DiagnosisState, Progress, RunPhase};
pub use workflow::{
    ExecutionPlan, StepDefinition, StepDependencyGraph, StepExecution, StepGroup,
    WorkflowCatalog, WorkflowTemplates,
};

/// Heimdallr version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
