//! Confidence-gated two-stage classifier.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::classify::rules::RuleClassifier;
use crate::domain::category::Category;
use crate::domain::classification::ClassificationResult;
use crate::domain::error::{HeimdallrError, Result};
use crate::executor::{execute_guarded, Parameters, TaskExecutor, TaskOutput};
use crate::response::decode_output_object;
use crate::workflow::steps::INPUT_CLASSIFICATION;

/// Rule confidence at or above which escalation is skipped.
pub const DEFAULT_ESCALATION_THRESHOLD: f64 = 0.85;

/// Ceiling for a rule result nudged after a failed escalation.
const FALLBACK_CONFIDENCE_CAP: f64 = 0.8;
const FALLBACK_CONFIDENCE_NUDGE: f64 = 0.1;

/// Rule stage first; the executor is consulted only when the rules are not
/// confident enough.
pub struct Classifier {
    rules: RuleClassifier,
    executor: Arc<dyn TaskExecutor>,
    escalation_threshold: f64,
}

impl Classifier {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            rules: RuleClassifier::new(),
            executor,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.escalation_threshold = threshold;
        self
    }

    pub fn rules(&self) -> &RuleClassifier {
        &self.rules
    }

    pub fn escalation_threshold(&self) -> f64 {
        self.escalation_threshold
    }

    /// Classify `text`. Never fails: any error becomes an unknown result
    /// with confidence 0.1.
    pub async fn classify(&self, text: &str) -> ClassificationResult {
        match self.try_classify(text).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "classification failed");
                ClassificationResult::failed(e)
            }
        }
    }

    async fn try_classify(&self, text: &str) -> Result<ClassificationResult> {
        let rule = self.rules.classify(text)?;
        debug!(
            category = %rule.category,
            confidence = rule.confidence,
            "rule stage finished"
        );

        if rule.confidence >= self.escalation_threshold {
            return Ok(rule);
        }

        info!(
            confidence = rule.confidence,
            threshold = self.escalation_threshold,
            "escalating classification"
        );
        Ok(self.escalate(text, rule).await)
    }

    async fn escalate(&self, text: &str, rule: ClassificationResult) -> ClassificationResult {
        let mut params = Parameters::new();
        params.insert("input_text".to_string(), Value::String(text.to_string()));

        let outcome = execute_guarded(self.executor.as_ref(), INPUT_CLASSIFICATION, &params).await;
        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "escalation call failed, keeping rule result");
                return nudged(rule, "escalation unavailable");
            }
        };

        match merge_escalation(&output, &rule) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "escalation response unreadable, keeping rule result");
                nudged(rule, "escalation response unreadable")
            }
        }
    }
}

/// Combine a decoded escalation response with the rule result. Decoded
/// `extracted` keys are layered over the rule stage's keys.
fn merge_escalation(output: &TaskOutput, rule: &ClassificationResult) -> Result<ClassificationResult> {
    let decoded = decode_output_object(output)?;

    let category = decoded
        .get("category")
        .or_else(|| decoded.get("input_type"))
        .and_then(Value::as_str)
        .map(Category::from_label)
        .unwrap_or(Category::Unknown);
    let confidence = match decoded.get("confidence") {
        None | Some(Value::Null) => 0.5,
        Some(value) => confidence_value(value)?,
    };
    let reasoning = decoded
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("model-assisted result");

    let mut extracted = rule.extracted.clone();
    if let Some(Value::Object(extra)) = decoded
        .get("extracted")
        .or_else(|| decoded.get("extracted_data"))
    {
        extracted.extend(extra.clone());
    }

    Ok(ClassificationResult::new(
        category,
        confidence,
        extracted,
        format!("AI classification: {reasoning}"),
    ))
}

/// Numbers pass through; numeric strings such as `"0.9"` are parsed.
fn confidence_value(value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|c| c.is_finite()),
        _ => None,
    };
    parsed.ok_or_else(|| {
        HeimdallrError::ResponseParse(format!("confidence {value} is not a number"))
    })
}

fn nudged(rule: ClassificationResult, note: &str) -> ClassificationResult {
    let confidence = (rule.confidence + FALLBACK_CONFIDENCE_NUDGE).min(FALLBACK_CONFIDENCE_CAP);
    let reasoning = format!("{} ({note})", rule.reasoning);
    ClassificationResult::new(rule.category, confidence, rule.extracted, reasoning)
}
