//! Final report assembly.

use serde_json::Value;

use crate::state::DiagnosisState;
use crate::workflow::steps::COMPREHENSIVE_REPORT;

const INPUT_PREVIEW_CHARS: usize = 200;

/// The report for a finished run: the report step's own text when it
/// succeeded, otherwise a summary built from the state.
pub fn final_report(state: &DiagnosisState) -> String {
    let Some(payload) = state.successful_payload(COMPREHENSIVE_REPORT) else {
        return basic_summary(state);
    };

    for key in ["raw_output", "report"] {
        if let Some(Value::String(text)) = payload.get(key) {
            return text.clone();
        }
    }
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| basic_summary(state))
}

/// Markdown summary of the run built only from state fields.
pub fn basic_summary(state: &DiagnosisState) -> String {
    let preview: String = state.input_text.chars().take(INPUT_PREVIEW_CHARS).collect();
    let ellipsis = if state.input_text.chars().count() > INPUT_PREVIEW_CHARS {
        "..."
    } else {
        ""
    };
    let (category, confidence) = state
        .classification
        .as_ref()
        .map(|c| (c.category.as_str(), c.confidence))
        .unwrap_or(("unknown", 0.0));

    let mut out = String::new();
    out.push_str("# Heimdallr Diagnosis Report\n\n");
    out.push_str("## Input\n");
    out.push_str(&format!("- Input: {preview}{ellipsis}\n"));
    out.push_str(&format!("- Category: {category}\n"));
    out.push_str(&format!("- Confidence: {confidence:.2}\n"));
    out.push_str(&format!("- Workflow: {}\n\n", state.workflow));
    out.push_str("## Execution\n");
    out.push_str(&format!("- Completed steps: {}\n", state.completed().len()));
    out.push_str(&format!("- Failed steps: {}\n", state.failed().len()));
    out.push_str(&format!(
        "- Total time: {:.2}s\n",
        state.total_duration.as_secs_f64()
    ));
    if !state.failed().is_empty() {
        out.push_str("\n## Failed steps\n");
        for name in state.failed() {
            let reason = state
                .get_result(name)
                .and_then(|r| r.error.as_deref())
                .unwrap_or("unknown error");
            out.push_str(&format!("- {name}: {reason}\n"));
        }
    }
    out.push_str("\n## Next steps\nReview the individual step results for details.\n");
    out
}

/// Report for a run whose level loop aborted.
pub fn failure_report(state: &DiagnosisState, error: &dyn std::fmt::Display) -> String {
    format!(
        "Workflow execution failed: {error}\n\n{}",
        basic_summary(state)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::domain::result::AnalysisResult;

    fn with_report(payload: Value) -> DiagnosisState {
        let Value::Object(map) = payload else {
            panic!("object expected");
        };
        let mut state = DiagnosisState::new("x");
        state.record_result(
            COMPREHENSIVE_REPORT,
            AnalysisResult::succeeded(COMPREHENSIVE_REPORT, map, Duration::ZERO),
        );
        state
    }

    #[test]
    fn test_report_prefers_raw_output_then_report_field() {
        let state = with_report(json!({"raw_output": "# raw", "report": "# field"}));
        assert_eq!(final_report(&state), "# raw");

        let state = with_report(json!({"report": "# field"}));
        assert_eq!(final_report(&state), "# field");
    }

    #[test]
    fn test_report_falls_back_to_pretty_payload() {
        let state = with_report(json!({"summary": "ok"}));
        assert_eq!(final_report(&state), "{\n  \"summary\": \"ok\"\n}");
    }

    #[test]
    fn test_failed_report_step_yields_basic_summary() {
        let mut state = DiagnosisState::new("a".repeat(300));
        state.workflow = "alert".to_string();
        state.record_result(
            COMPREHENSIVE_REPORT,
            AnalysisResult::failed(COMPREHENSIVE_REPORT, "model overloaded", Duration::ZERO),
        );
        let report = final_report(&state);
        assert!(report.starts_with("# Heimdallr Diagnosis Report"));
        assert!(report.contains(&format!("- Input: {}...", "a".repeat(200))));
        assert!(report.contains("- Failed steps: 1"));
        assert!(report.contains("- comprehensive_report: model overloaded"));
        assert!(report.contains("- Category: unknown"));
    }

    #[test]
    fn test_failure_report_prefix() {
        let state = DiagnosisState::new("x");
        let report = failure_report(&state, &"level 2 lost a result");
        assert!(report.starts_with("Workflow execution failed: level 2 lost a result\n\n# Heimdallr"));
    }
}
