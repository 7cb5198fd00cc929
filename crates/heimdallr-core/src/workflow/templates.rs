//! Category → step list templates.

use std::collections::HashMap;

use crate::domain::category::Category;
use crate::workflow::steps::*;

const SYNTHESIS_TAIL: [&str; 5] = [
    TIMELINE_RECONSTRUCTION,
    ROOT_CAUSE_HYPOTHESIS,
    HYPOTHESIS_VALIDATION,
    SOLUTION_ARCHITECTURE,
    COMPREHENSIVE_REPORT,
];

/// Ordered step lists per category. Selecting a template does not schedule
/// anything; the lists feed the dependency resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowTemplates {
    by_category: HashMap<Category, Vec<String>>,
}

impl WorkflowTemplates {
    /// Build from explicit lists. A template for [`Category::Alert`] is
    /// required since it is the fallback for unmapped categories.
    pub fn new(by_category: HashMap<Category, Vec<String>>) -> Option<Self> {
        by_category
            .contains_key(&Category::Alert)
            .then_some(Self { by_category })
    }

    pub fn standard() -> Self {
        let with_tail = |head: &[&str]| -> Vec<String> {
            head.iter()
                .chain(SYNTHESIS_TAIL.iter())
                .map(|s| s.to_string())
                .collect()
        };

        let mut by_category = HashMap::new();
        by_category.insert(
            Category::Alert,
            with_tail(&[
                INPUT_CLASSIFICATION,
                ALERT_TRIAGE,
                ALERT_COMPONENT_IDENTIFICATION,
                ALERT_LOG_SEARCH_PARAMS,
                LOG_SEARCH_EXECUTION,
                LOG_PATTERN_ANALYSIS,
                ALERT_BUSINESS_IMPACT,
            ]),
        );
        by_category.insert(
            Category::Ticket,
            with_tail(&[
                INPUT_CLASSIFICATION,
                TICKET_BASIC_INFO,
                TICKET_CATEGORIZATION,
                TICKET_COMPONENTS_ANALYSIS,
                TICKET_CONTEXT_ENRICHMENT,
            ]),
        );
        by_category.insert(
            Category::LogQuery,
            with_tail(&[
                INPUT_CLASSIFICATION,
                LOG_SEARCH_EXECUTION,
                LOG_PATTERN_ANALYSIS,
                LOG_ANOMALY_DETECTION,
                LOG_CORRELATION_ANALYSIS,
            ]),
        );
        by_category.insert(
            Category::Hybrid,
            with_tail(&[
                INPUT_CLASSIFICATION,
                ALERT_TRIAGE,
                TICKET_BASIC_INFO,
                LOG_SEARCH_EXECUTION,
                ALERT_COMPONENT_IDENTIFICATION,
                TICKET_CATEGORIZATION,
                LOG_PATTERN_ANALYSIS,
            ]),
        );
        Self { by_category }
    }

    /// Template for `category`, falling back to the alert template.
    pub fn select(&self, category: Category) -> &[String] {
        self.by_category
            .get(&category)
            .or_else(|| self.by_category.get(&Category::Alert))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `category` has its own template rather than the fallback.
    pub fn has_template(&self, category: Category) -> bool {
        self.by_category.contains_key(&category)
    }

    /// All step names referenced by any template.
    pub fn referenced_steps(&self) -> impl Iterator<Item = &str> {
        self.by_category.values().flatten().map(String::as_str)
    }
}
