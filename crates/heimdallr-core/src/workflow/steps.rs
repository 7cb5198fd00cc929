//! Step vocabulary: names, groups and the `StepDefinition` table.
//!
//! Every analysis step is one row of the same parameterised definition. The
//! row names the parameters the step needs and the JSON shape the executor is
//! asked to return.

use serde::{Deserialize, Serialize};

use crate::executor::{ExecutorError, Parameters};

pub const INPUT_CLASSIFICATION: &str = "input_classification";
pub const PATTERN_EXTRACTION: &str = "pattern_extraction";

pub const ALERT_TRIAGE: &str = "alert_triage";
pub const ALERT_COMPONENT_IDENTIFICATION: &str = "alert_component_identification";
pub const ALERT_LOG_SEARCH_PARAMS: &str = "alert_log_search_params";
pub const ALERT_BUSINESS_IMPACT: &str = "alert_business_impact";

pub const TICKET_BASIC_INFO: &str = "ticket_basic_info";
pub const TICKET_CATEGORIZATION: &str = "ticket_categorization";
pub const TICKET_COMPONENTS_ANALYSIS: &str = "ticket_components_analysis";
pub const TICKET_CONTEXT_ENRICHMENT: &str = "ticket_context_enrichment";

pub const LOG_SEARCH_EXECUTION: &str = "log_search_execution";
pub const LOG_PATTERN_ANALYSIS: &str = "log_pattern_analysis";
pub const LOG_ANOMALY_DETECTION: &str = "log_anomaly_detection";
pub const LOG_CORRELATION_ANALYSIS: &str = "log_correlation_analysis";

pub const TIMELINE_RECONSTRUCTION: &str = "timeline_reconstruction";
pub const ROOT_CAUSE_HYPOTHESIS: &str = "root_cause_hypothesis";
pub const HYPOTHESIS_VALIDATION: &str = "hypothesis_validation";
pub const SOLUTION_ARCHITECTURE: &str = "solution_architecture";
pub const COMPREHENSIVE_REPORT: &str = "comprehensive_report";

/// Coarse grouping used for listing and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepGroup {
    Classification,
    Alert,
    Ticket,
    Log,
    Synthesis,
}

/// How the coordinator satisfies a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepExecution {
    /// Produced from run state without calling the executor.
    Local,
    /// Dispatched to the task executor.
    Executor,
}

/// One analysis step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub name: String,
    pub group: StepGroup,
    pub execution: StepExecution,
    /// Task instruction handed to model-backed executors.
    pub instruction: String,
    pub required_params: Vec<String>,
    /// Example of the JSON object the step should return.
    pub output_schema: String,
}

impl StepDefinition {
    pub fn new(
        name: &str,
        group: StepGroup,
        instruction: &str,
        required_params: &[&str],
        output_schema: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            group,
            execution: StepExecution::Executor,
            instruction: instruction.to_string(),
            required_params: required_params.iter().map(|p| p.to_string()).collect(),
            output_schema: output_schema.to_string(),
        }
    }

    pub fn local(mut self) -> Self {
        self.execution = StepExecution::Local;
        self
    }

    /// Required parameter keys absent from `params`.
    pub fn missing_params(&self, params: &Parameters) -> Vec<String> {
        self.required_params
            .iter()
            .filter(|key| !params.contains_key(key.as_str()))
            .cloned()
            .collect()
    }
}

/// Check `params` against `def` before dispatch.
pub fn validate_params(def: &StepDefinition, params: &Parameters) -> Result<(), ExecutorError> {
    let missing = def.missing_params(params);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ExecutorError::MissingParameters {
            step: def.name.clone(),
            missing,
        })
    }
}

/// The built-in step table.
pub fn standard_steps() -> Vec<StepDefinition> {
    use StepGroup::*;

    vec![
        StepDefinition::new(
            INPUT_CLASSIFICATION,
            Classification,
            "Classify the diagnostic input as alert, ticket, log_query, hybrid or unknown \
             and extract the identifiers, services and time hints it mentions.",
            &["input_text"],
            r#"{"category": "alert|ticket|log_query|hybrid|unknown", "confidence": 0.9, "extracted": {}, "reasoning": "..."}"#,
        )
        .local(),
        StepDefinition::new(
            PATTERN_EXTRACTION,
            Classification,
            "Extract the requested patterns from the input text. Return one key per \
             requested pattern, each holding a list of matches.",
            &["input_text", "target_patterns"],
            r#"{"ticket_ids": [], "timestamps": [], "ip_addresses": [], "service_names": []}"#,
        ),
        StepDefinition::new(
            ALERT_TRIAGE,
            Alert,
            "Assess the alert's severity (Critical, High, Medium, Low), its type \
             (DATABASE, APPLICATION, NETWORK, INFRASTRUCTURE, SECURITY) and urgency.",
            &["alert_text"],
            r#"{"severity": "High", "alert_type": "APPLICATION", "urgency_level": "Immediate", "reasoning": "...", "confidence": 0.9}"#,
        ),
        StepDefinition::new(
            ALERT_COMPONENT_IDENTIFICATION,
            Alert,
            "Identify the system components affected by the alert, separating primary \
             components from ones that may be impacted downstream.",
            &["alert_text"],
            r#"{"primary_components": ["service-name"], "secondary_components": [], "component_types": {}, "confidence": 0.9}"#,
        ),
        StepDefinition::new(
            ALERT_LOG_SEARCH_PARAMS,
            Alert,
            "Propose log searches for the alert: which applications to search, the \
             queries to run and the time window to cover.",
            &["alert_info", "components"],
            r#"{"applications": ["service-name"], "search_queries": [{"query": "ERROR", "purpose": "..."}], "time_range": "1h"}"#,
        ),
        StepDefinition::new(
            ALERT_BUSINESS_IMPACT,
            Alert,
            "Estimate the business impact of the alert: affected users, functions and \
             revenue exposure.",
            &["alert_text", "components"],
            r#"{"impact_level": "High", "affected_users": "...", "affected_functions": [], "revenue_impact": "..."}"#,
        ),
        StepDefinition::new(
            TICKET_BASIC_INFO,
            Ticket,
            "Fetch the ticket and summarise its title, status, priority, reporter, \
             description and linked items.",
            &["issue_key"],
            r#"{"key": "PROJ-123", "summary": "...", "status": "Open", "priority": "High", "description": "..."}"#,
        ),
        StepDefinition::new(
            TICKET_CATEGORIZATION,
            Ticket,
            "Categorise the ticket: bug, incident, feature request or task, and the \
             technical area it belongs to.",
            &["issue_content"],
            r#"{"issue_category": "BUG", "technical_area": "...", "complexity": "Medium", "reasoning": "..."}"#,
        ),
        StepDefinition::new(
            TICKET_COMPONENTS_ANALYSIS,
            Ticket,
            "List the services, modules and infrastructure the ticket touches.",
            &["issue_content"],
            r#"{"components": [], "services": [], "infrastructure": []}"#,
        ),
        StepDefinition::new(
            TICKET_CONTEXT_ENRICHMENT,
            Ticket,
            "Enrich the ticket with context: related incidents, recent changes and \
             owners of the affected components.",
            &["issue_info", "components"],
            r#"{"related_issues": [], "recent_changes": [], "owners": []}"#,
        ),
        StepDefinition::new(
            LOG_SEARCH_EXECUTION,
            Log,
            "Run the log search for the given applications and query and return the \
             matching entries.",
            &["applications", "query"],
            r#"{"entries": [], "total_hits": 0, "time_range": "1h"}"#,
        ),
        StepDefinition::new(
            LOG_PATTERN_ANALYSIS,
            Log,
            "Find recurring error patterns in the log entries with their frequency \
             and first/last occurrence.",
            &["log_entries"],
            r#"{"patterns": [{"pattern": "...", "count": 0, "first_seen": "...", "last_seen": "..."}]}"#,
        ),
        StepDefinition::new(
            LOG_ANOMALY_DETECTION,
            Log,
            "Detect anomalies in the log entries: spikes, new error types and gaps.",
            &["log_entries"],
            r#"{"anomalies": [], "baseline_deviation": "..."}"#,
        ),
        StepDefinition::new(
            LOG_CORRELATION_ANALYSIS,
            Log,
            "Correlate events across the log entries and identify causal chains.",
            &["log_entries"],
            r#"{"correlations": [], "causal_chain": []}"#,
        ),
        StepDefinition::new(
            TIMELINE_RECONSTRUCTION,
            Synthesis,
            "Reconstruct an ordered incident timeline from all available analysis data.",
            &["all_data"],
            r#"{"events": [{"timestamp": "...", "event": "...", "source": "..."}]}"#,
        ),
        StepDefinition::new(
            ROOT_CAUSE_HYPOTHESIS,
            Synthesis,
            "Generate ranked root-cause hypotheses from the timeline and log patterns.",
            &["timeline", "patterns"],
            r#"{"hypotheses": [{"description": "...", "likelihood": 0.7, "evidence": []}]}"#,
        ),
        StepDefinition::new(
            HYPOTHESIS_VALIDATION,
            Synthesis,
            "Validate each hypothesis against the available data and pick the most \
             likely root cause.",
            &["hypotheses", "available_data"],
            r#"{"validated_root_cause": "...", "confidence": 0.8, "rejected": []}"#,
        ),
        StepDefinition::new(
            SOLUTION_ARCHITECTURE,
            Synthesis,
            "Propose immediate mitigations and long-term fixes for the validated root \
             cause.",
            &["validated_root_cause"],
            r#"{"immediate_actions": [], "long_term_fixes": [], "prevention": []}"#,
        ),
        StepDefinition::new(
            COMPREHENSIVE_REPORT,
            Synthesis,
            "Write the final diagnosis report in Markdown covering summary, impact, \
             timeline, root cause and recommended actions.",
            &["all_analysis_results"],
            r##"{"report": "# Diagnosis report ..."}"##,
        ),
    ]
}
