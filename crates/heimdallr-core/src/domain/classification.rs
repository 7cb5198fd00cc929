//! Classification outcome for a single diagnosis input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::category::Category;

/// Result of classifying one input.
///
/// `confidence` is always within `[0, 1]`; every constructor clamps it.
/// Once produced, only [`ClassificationResult::merge_extracted`] may change
/// the value, and it never touches `category` or `confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,
    pub confidence: f64,
    #[serde(default)]
    pub extracted: Map<String, Value>,
    #[serde(default)]
    pub reasoning: String,
}

impl ClassificationResult {
    pub fn new(
        category: Category,
        confidence: f64,
        extracted: Map<String, Value>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            category,
            confidence: clamp_confidence(confidence),
            extracted,
            reasoning: reasoning.into(),
        }
    }

    /// Degraded result used when classification itself fails.
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self::new(
            Category::Unknown,
            0.1,
            Map::new(),
            format!("classification failed: {reason}"),
        )
    }

    /// Layer `extra` on top of the extracted map. Keys already present are
    /// replaced; keys only present in the current map are kept.
    pub fn merge_extracted(&mut self, extra: Map<String, Value>) {
        for (key, value) in extra {
            self.extracted.insert(key, value);
        }
    }

    /// Ticket identifiers found in the input, if any.
    pub fn ticket_ids(&self) -> Vec<String> {
        self.extracted
            .get("ticket_ids")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Clamp into `[0, 1]`; NaN collapses to 0.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        return 0.0;
    }
    confidence.clamp(0.0, 1.0)
}
