//! Dependency level resolution over custom and built-in graphs.

use std::collections::HashSet;

use heimdallr_core::{Category, HeimdallrError, StepDependencyGraph, WorkflowCatalog};

fn names(steps: &[&str]) -> Vec<String> {
    steps.iter().map(|s| s.to_string()).collect()
}

#[test]
fn fan_out_yields_two_levels() {
    let graph = StepDependencyGraph::from_edges([("a", vec![]), ("b", vec!["a"]), ("c", vec!["a"])]);
    let plan = graph.resolve_levels(&names(&["a", "b", "c"]));

    assert_eq!(plan.levels.len(), 2);
    assert_eq!(plan.levels[0], names(&["a"]));
    let second: HashSet<&str> = plan.levels[1].iter().map(String::as_str).collect();
    assert_eq!(second, HashSet::from(["b", "c"]));
}

#[test]
fn unrequested_dependency_is_treated_as_satisfied() {
    let graph = StepDependencyGraph::from_edges([("x", vec!["y"]), ("y", vec![])]);
    let plan = graph.resolve_levels(&names(&["x"]));
    assert_eq!(plan.levels, vec![names(&["x"])]);
}

#[test]
fn masked_cycle_is_flagged_and_strict_mode_rejects_it() {
    let graph = StepDependencyGraph::from_edges([("p", vec!["q"]), ("q", vec!["p"])]);
    let requested = names(&["p", "q"]);

    let plan = graph.resolve_levels(&requested);
    assert_eq!(plan.levels.len(), 1);
    assert_eq!(plan.forced_level, Some(0));

    assert!(matches!(
        graph.resolve_strict(&requested),
        Err(HeimdallrError::DependencyCycle { .. })
    ));
}

#[test]
fn every_category_plan_respects_dependencies() {
    let catalog = WorkflowCatalog::standard();
    for category in Category::ALL {
        let template = catalog.templates().select(category);
        let plan = catalog.plan_for(category);
        assert!(!plan.has_masked_cycle(), "{category} plan has a cycle");
        assert_eq!(plan.step_count(), template.len());

        let requested: HashSet<&str> = template.iter().map(String::as_str).collect();
        for (idx, level) in plan.levels.iter().enumerate() {
            for step in level {
                for dep in catalog.graph().dependencies_of(step) {
                    if requested.contains(dep.as_str()) {
                        let dep_level = plan.level_of(dep).unwrap();
                        assert!(dep_level < idx, "{category}: {dep} must run before {step}");
                    }
                }
            }
        }
    }
}

#[test]
fn standard_catalog_validates_through_new() {
    let catalog = WorkflowCatalog::new(
        heimdallr_core::workflow::steps::standard_steps(),
        StepDependencyGraph::standard(),
        heimdallr_core::WorkflowTemplates::standard(),
    )
    .unwrap();
    assert_eq!(catalog.steps().len(), 19);
    assert_eq!(catalog.graph().len(), 19);
}
