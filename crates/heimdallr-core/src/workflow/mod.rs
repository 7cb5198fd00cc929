//! Workflow configuration: step table, dependency graph and templates.
//!
//! # Module layout
//!
//! - [`steps`]: step names, `StepDefinition`, `standard_steps`
//! - [`graph`]: `StepDependencyGraph`, `ExecutionPlan`
//! - [`templates`]: `WorkflowTemplates`
//!
//! [`WorkflowCatalog`] bundles the three into one immutable value that is
//! built once and shared by reference.

pub mod graph;
pub mod steps;
pub mod templates;

use std::collections::HashMap;

use crate::domain::category::Category;
use crate::domain::error::{HeimdallrError, Result};

pub use graph::{ExecutionPlan, StepDependencyGraph};
pub use steps::{StepDefinition, StepExecution, StepGroup};
pub use templates::WorkflowTemplates;

/// Immutable workflow configuration.
#[derive(Debug, Clone)]
pub struct WorkflowCatalog {
    steps: HashMap<String, StepDefinition>,
    graph: StepDependencyGraph,
    templates: WorkflowTemplates,
}

impl WorkflowCatalog {
    /// Assemble a catalog, rejecting templates that reference undefined steps.
    pub fn new(
        steps: Vec<StepDefinition>,
        graph: StepDependencyGraph,
        templates: WorkflowTemplates,
    ) -> Result<Self> {
        let steps: HashMap<String, StepDefinition> =
            steps.into_iter().map(|s| (s.name.clone(), s)).collect();

        let mut undefined: Vec<String> = templates
            .referenced_steps()
            .filter(|name| !steps.contains_key(*name))
            .map(str::to_string)
            .collect();
        undefined.sort();
        undefined.dedup();
        if let Some(first) = undefined.into_iter().next() {
            return Err(HeimdallrError::UnknownStep(first));
        }

        Ok(Self {
            steps,
            graph,
            templates,
        })
    }

    /// The built-in catalog.
    pub fn standard() -> Self {
        Self {
            steps: steps::standard_steps()
                .into_iter()
                .map(|s| (s.name.clone(), s))
                .collect(),
            graph: StepDependencyGraph::standard(),
            templates: WorkflowTemplates::standard(),
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.get(name)
    }

    /// Step definitions sorted by name.
    pub fn steps(&self) -> Vec<&StepDefinition> {
        let mut all: Vec<&StepDefinition> = self.steps.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn graph(&self) -> &StepDependencyGraph {
        &self.graph
    }

    pub fn templates(&self) -> &WorkflowTemplates {
        &self.templates
    }

    /// Template for `category` resolved into execution levels.
    pub fn plan_for(&self, category: Category) -> ExecutionPlan {
        self.graph.resolve_levels(self.templates.select(category))
    }
}

impl Default for WorkflowCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
