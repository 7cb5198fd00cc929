//! Step definition + parameters -> chat messages.

use heimdallr_core::{Parameters, StepDefinition};
use serde_json::Value;

const SYSTEM_PREAMBLE: &str = "You are one analyst in an incident diagnosis pipeline. \
Answer only the task you are given. Reply with a single JSON object and nothing else.";

/// A system/user message pair ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Render `def` with `params` into chat messages.
///
/// Parameters are listed in key order. String values are inlined verbatim;
/// anything else is pretty-printed JSON.
pub fn render(def: &StepDefinition, params: &Parameters) -> RenderedPrompt {
    let mut user = format!("## Task: {}\n\n{}\n", def.name, def.instruction);

    if !params.is_empty() {
        user.push_str("\n## Inputs\n");
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();
        for key in keys {
            user.push_str(&format!("\n### {key}\n{}\n", inline(&params[key.as_str()])));
        }
    }

    user.push_str(&format!(
        "\n## Output\nReturn a JSON object shaped like:\n{}\n",
        def.output_schema
    ));

    RenderedPrompt {
        system: SYSTEM_PREAMBLE.to_string(),
        user,
    }
}

fn inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heimdallr_core::workflow::steps::{ALERT_LOG_SEARCH_PARAMS, ALERT_TRIAGE};
    use heimdallr_core::WorkflowCatalog;
    use serde_json::json;

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_render_includes_instruction_inputs_and_schema() {
        let catalog = WorkflowCatalog::standard();
        let def = catalog.step(ALERT_TRIAGE).unwrap();
        let prompt = render(def, &params(json!({"alert_text": "db down, critical"})));

        assert!(prompt.system.contains("JSON object"));
        assert!(prompt.user.starts_with("## Task: alert_triage"));
        assert!(prompt.user.contains(&def.instruction));
        assert!(prompt.user.contains("### alert_text\ndb down, critical"));
        assert!(prompt.user.contains(&def.output_schema));
    }

    #[test]
    fn test_structured_params_are_pretty_printed_in_key_order() {
        let catalog = WorkflowCatalog::standard();
        let def = catalog.step(ALERT_LOG_SEARCH_PARAMS).unwrap();
        let prompt = render(
            def,
            &params(json!({
                "components": {"primary_components": ["billing"]},
                "alert_info": "billing 500s",
            })),
        );

        let alert_at = prompt.user.find("### alert_info").unwrap();
        let components_at = prompt.user.find("### components").unwrap();
        assert!(alert_at < components_at);
        assert!(prompt.user.contains("\"primary_components\": [\n"));
    }

    #[test]
    fn test_no_inputs_section_without_params() {
        let catalog = WorkflowCatalog::standard();
        let def = catalog.step(ALERT_TRIAGE).unwrap();
        let prompt = render(def, &Parameters::new());
        assert!(!prompt.user.contains("## Inputs"));
    }
}
