//! Parameter derivation.
//!
//! Each step reads a fixed set of upstream results out of the state and maps
//! fields of those payloads to its own parameter keys. A missing or failed
//! upstream result yields a default value; the step still runs.

use serde_json::{json, Map, Value};

use crate::classify::extract::target_patterns;
use crate::executor::Parameters;
use crate::state::DiagnosisState;
use crate::workflow::steps::*;

const DEFAULT_APPLICATION: &str = "default-app";
const DEFAULT_LOG_QUERY: &str = "ERROR";
const NO_LOG_DATA: &str = "No log data available";

/// Parameters for `step` given what `state` holds so far.
pub fn derive_parameters(step: &str, state: &DiagnosisState) -> Parameters {
    let mut params = Parameters::new();
    let input = || Value::String(state.input_text.clone());

    match step {
        INPUT_CLASSIFICATION => {
            params.insert("input_text".into(), input());
        }
        PATTERN_EXTRACTION => {
            params.insert("input_text".into(), input());
            params.insert(
                "target_patterns".into(),
                Value::from(target_patterns(state.category())),
            );
        }

        ALERT_TRIAGE | ALERT_COMPONENT_IDENTIFICATION => {
            params.insert("alert_text".into(), input());
        }
        ALERT_LOG_SEARCH_PARAMS => {
            params.insert("alert_info".into(), input());
            params.insert("components".into(), payload_or_empty(state, ALERT_COMPONENT_IDENTIFICATION));
        }
        ALERT_BUSINESS_IMPACT => {
            params.insert("alert_text".into(), input());
            params.insert("components".into(), payload_or_empty(state, ALERT_COMPONENT_IDENTIFICATION));
        }

        TICKET_BASIC_INFO => {
            insert_issue_key(&mut params, state);
        }
        TICKET_CATEGORIZATION | TICKET_COMPONENTS_ANALYSIS => {
            insert_issue_key(&mut params, state);
            let content = payload_text(state, TICKET_BASIC_INFO).unwrap_or_else(|| state.input_text.clone());
            params.insert("issue_content".into(), Value::String(content));
        }
        TICKET_CONTEXT_ENRICHMENT => {
            insert_issue_key(&mut params, state);
            params.insert("issue_info".into(), payload_or_empty(state, TICKET_BASIC_INFO));
            params.insert("components".into(), payload_or_empty(state, TICKET_COMPONENTS_ANALYSIS));
        }

        LOG_SEARCH_EXECUTION => {
            let search = state.successful_payload(ALERT_LOG_SEARCH_PARAMS);
            let applications = search
                .and_then(|p| p.get("applications"))
                .cloned()
                .unwrap_or_else(|| json!([DEFAULT_APPLICATION]));
            let query = search
                .and_then(|p| p.get("search_queries"))
                .and_then(Value::as_array)
                .and_then(|queries| queries.first())
                .and_then(|q| q.get("query"))
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_LOG_QUERY);
            params.insert("applications".into(), applications);
            params.insert("query".into(), Value::String(query.to_string()));
        }
        LOG_PATTERN_ANALYSIS | LOG_ANOMALY_DETECTION | LOG_CORRELATION_ANALYSIS => {
            let entries =
                payload_text(state, LOG_SEARCH_EXECUTION).unwrap_or_else(|| NO_LOG_DATA.to_string());
            params.insert("log_entries".into(), Value::String(entries));
        }

        TIMELINE_RECONSTRUCTION => {
            params.insert("all_data".into(), Value::Object(state.successful_payloads()));
        }
        ROOT_CAUSE_HYPOTHESIS => {
            params.insert("timeline".into(), payload_or_empty(state, TIMELINE_RECONSTRUCTION));
            params.insert("patterns".into(), payload_or_empty(state, LOG_PATTERN_ANALYSIS));
        }
        HYPOTHESIS_VALIDATION => {
            params.insert("hypotheses".into(), payload_or_empty(state, ROOT_CAUSE_HYPOTHESIS));
            params.insert("available_data".into(), Value::Object(state.successful_payloads()));
        }
        SOLUTION_ARCHITECTURE => {
            params.insert(
                "validated_root_cause".into(),
                payload_or_empty(state, HYPOTHESIS_VALIDATION),
            );
            params.insert("context".into(), Value::Object(state.successful_payloads()));
        }
        COMPREHENSIVE_REPORT => {
            params.insert(
                "all_analysis_results".into(),
                Value::Object(state.successful_payloads()),
            );
        }

        _ => {}
    }

    params
}

fn insert_issue_key(params: &mut Parameters, state: &DiagnosisState) {
    if let Some(key) = state.primary_ticket() {
        params.insert("issue_key".into(), Value::String(key.to_string()));
    }
}

fn payload_or_empty(state: &DiagnosisState, step: &str) -> Value {
    Value::Object(state.successful_payload(step).cloned().unwrap_or_else(Map::new))
}

/// Successful payload of `step` rendered as compact JSON text.
fn payload_text(state: &DiagnosisState, step: &str) -> Option<String> {
    state
        .successful_payload(step)
        .map(|payload| Value::Object(payload.clone()).to_string())
}
