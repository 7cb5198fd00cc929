//! Step dependency graph and level planning.
//!
//! The graph maps each step to the steps it depends on. Planning turns a
//! requested step list into execution levels by repeated frontier
//! extraction: every unscheduled step whose requested dependencies are all
//! scheduled joins the next level. Dependencies outside the requested list
//! count as satisfied, since they simply were not asked for this run.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::error::{HeimdallrError, Result};
use crate::workflow::steps::*;

/// Read-only mapping from step name to the step names it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepDependencyGraph {
    upstream: HashMap<String, Vec<String>>,
}

impl StepDependencyGraph {
    /// Build a graph from `(step, dependencies)` pairs.
    pub fn from_edges<I, S, D>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, D)>,
        S: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let upstream = edges
            .into_iter()
            .map(|(step, deps)| (step.into(), deps.into_iter().map(Into::into).collect()))
            .collect();
        Self { upstream }
    }

    /// The built-in graph over the standard step table.
    pub fn standard() -> Self {
        Self::from_edges([
            (INPUT_CLASSIFICATION, vec![]),
            (PATTERN_EXTRACTION, vec![INPUT_CLASSIFICATION]),
            (ALERT_TRIAGE, vec![INPUT_CLASSIFICATION]),
            (ALERT_COMPONENT_IDENTIFICATION, vec![ALERT_TRIAGE]),
            (ALERT_LOG_SEARCH_PARAMS, vec![ALERT_COMPONENT_IDENTIFICATION]),
            (ALERT_BUSINESS_IMPACT, vec![ALERT_COMPONENT_IDENTIFICATION]),
            (TICKET_BASIC_INFO, vec![INPUT_CLASSIFICATION]),
            (TICKET_CATEGORIZATION, vec![TICKET_BASIC_INFO]),
            (TICKET_COMPONENTS_ANALYSIS, vec![TICKET_BASIC_INFO]),
            (
                TICKET_CONTEXT_ENRICHMENT,
                vec![TICKET_BASIC_INFO, TICKET_CATEGORIZATION],
            ),
            (LOG_SEARCH_EXECUTION, vec![ALERT_LOG_SEARCH_PARAMS]),
            (LOG_PATTERN_ANALYSIS, vec![LOG_SEARCH_EXECUTION]),
            (LOG_ANOMALY_DETECTION, vec![LOG_SEARCH_EXECUTION]),
            (LOG_CORRELATION_ANALYSIS, vec![LOG_SEARCH_EXECUTION]),
            (
                TIMELINE_RECONSTRUCTION,
                vec![ALERT_TRIAGE, TICKET_BASIC_INFO, LOG_PATTERN_ANALYSIS],
            ),
            (ROOT_CAUSE_HYPOTHESIS, vec![TIMELINE_RECONSTRUCTION]),
            (HYPOTHESIS_VALIDATION, vec![ROOT_CAUSE_HYPOTHESIS]),
            (SOLUTION_ARCHITECTURE, vec![HYPOTHESIS_VALIDATION]),
            (COMPREHENSIVE_REPORT, vec![SOLUTION_ARCHITECTURE]),
        ])
    }

    /// Direct dependencies of `step`; empty for steps the graph does not know.
    pub fn dependencies_of(&self, step: &str) -> &[String] {
        self.upstream.get(step).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, step: &str) -> bool {
        self.upstream.contains_key(step)
    }

    pub fn len(&self) -> usize {
        self.upstream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstream.is_empty()
    }

    /// Partition `requested` into execution levels.
    ///
    /// When an iteration can schedule nothing (a cycle within the requested
    /// subset) all remaining steps are flushed as one final level. The flush
    /// is logged at `warn!` and its index recorded in
    /// [`ExecutionPlan::forced_level`].
    pub fn resolve_levels(&self, requested: &[String]) -> ExecutionPlan {
        let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
        let mut remaining: Vec<&str> = Vec::new();
        for step in requested {
            if !remaining.contains(&step.as_str()) {
                remaining.push(step.as_str());
            }
        }

        let mut scheduled: HashSet<&str> = HashSet::new();
        let mut levels: Vec<Vec<String>> = Vec::new();
        let mut forced_level = None;

        while !remaining.is_empty() {
            let ready: Vec<&str> = remaining
                .iter()
                .copied()
                .filter(|step| {
                    self.dependencies_of(step)
                        .iter()
                        .all(|dep| scheduled.contains(dep.as_str()) || !wanted.contains(dep.as_str()))
                })
                .collect();

            let level = if ready.is_empty() {
                warn!(
                    steps = ?remaining,
                    "dependency cycle among requested steps; flushing them as one level"
                );
                forced_level = Some(levels.len());
                std::mem::take(&mut remaining)
            } else {
                remaining.retain(|step| !ready.contains(step));
                ready
            };

            scheduled.extend(level.iter().copied());
            levels.push(level.into_iter().map(str::to_string).collect());
        }

        ExecutionPlan {
            levels,
            forced_level,
        }
    }

    /// Like [`resolve_levels`](Self::resolve_levels) but refuses to mask a
    /// cycle.
    pub fn resolve_strict(&self, requested: &[String]) -> Result<ExecutionPlan> {
        let plan = self.resolve_levels(requested);
        match plan.forced_level {
            Some(idx) => Err(HeimdallrError::DependencyCycle {
                steps: plan.levels[idx].clone(),
            }),
            None => Ok(plan),
        }
    }
}

/// Ordered execution levels. Steps within a level have no dependency on one
/// another among the requested steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub levels: Vec<Vec<String>>,
    /// Index of a level produced by flushing a dependency cycle.
    pub forced_level: Option<usize>,
}

impl ExecutionPlan {
    pub fn step_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Level index holding `step`.
    pub fn level_of(&self, step: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|s| s == step))
    }

    pub fn has_masked_cycle(&self) -> bool {
        self.forced_level.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(steps: &[&str]) -> Vec<String> {
        steps.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fan_out_forms_two_levels() {
        let graph = StepDependencyGraph::from_edges([
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["a"]),
        ]);
        let plan = graph.resolve_levels(&names(&["a", "b", "c"]));
        assert_eq!(plan.levels.len(), 2);
        assert_eq!(plan.levels[0], names(&["a"]));
        let mut second = plan.levels[1].clone();
        second.sort();
        assert_eq!(second, names(&["b", "c"]));
        assert!(!plan.has_masked_cycle());
    }

    #[test]
    fn test_unrequested_dependency_counts_as_satisfied() {
        let graph = StepDependencyGraph::from_edges([("x", vec!["y"]), ("y", vec![])]);
        let plan = graph.resolve_levels(&names(&["x"]));
        assert_eq!(plan.levels, vec![names(&["x"])]);
    }

    #[test]
    fn test_cycle_is_flushed_and_flagged() {
        let graph = StepDependencyGraph::from_edges([
            ("root", vec![]),
            ("p", vec!["root", "q"]),
            ("q", vec!["p"]),
        ]);
        let plan = graph.resolve_levels(&names(&["root", "p", "q"]));
        assert_eq!(plan.levels.len(), 2);
        assert_eq!(plan.forced_level, Some(1));
        assert_eq!(plan.step_count(), 3);

        let err = graph.resolve_strict(&names(&["root", "p", "q"])).unwrap_err();
        match err {
            HeimdallrError::DependencyCycle { steps } => {
                assert!(steps.contains(&"p".to_string()));
                assert!(steps.contains(&"q".to_string()));
            }
            other => panic!("expected DependencyCycle, got {other:?}"),
        }
    }

    #[test]
    fn test_every_step_lands_in_exactly_one_level() {
        let graph = StepDependencyGraph::standard();
        let requested = names(&[
            INPUT_CLASSIFICATION,
            ALERT_TRIAGE,
            ALERT_COMPONENT_IDENTIFICATION,
            ALERT_LOG_SEARCH_PARAMS,
            LOG_SEARCH_EXECUTION,
            LOG_PATTERN_ANALYSIS,
            ALERT_BUSINESS_IMPACT,
            TIMELINE_RECONSTRUCTION,
            COMPREHENSIVE_REPORT,
        ]);
        let plan = graph.resolve_levels(&requested);
        assert_eq!(plan.step_count(), requested.len());
        for step in &requested {
            let lvl = plan.level_of(step).unwrap();
            for dep in graph.dependencies_of(step) {
                if let Some(dep_lvl) = plan.level_of(dep) {
                    assert!(dep_lvl < lvl, "{dep} must precede {step}");
                }
            }
        }
    }

    #[test]
    fn test_duplicate_requests_are_scheduled_once() {
        let graph = StepDependencyGraph::from_edges([("a", Vec::<&str>::new())]);
        let plan = graph.resolve_levels(&names(&["a", "a"]));
        assert_eq!(plan.levels, vec![names(&["a"])]);
    }

    #[test]
    fn test_empty_request_yields_no_levels() {
        let plan = StepDependencyGraph::standard().resolve_levels(&[]);
        assert!(plan.levels.is_empty());
    }
}
