//! Executor-backed pattern extraction, run once after classification.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::category::Category;
use crate::domain::classification::ClassificationResult;
use crate::domain::error::Result;
use crate::executor::{execute_guarded, Parameters, TaskExecutor};
use crate::response::decode_output_object;
use crate::workflow::steps::PATTERN_EXTRACTION;

const BASE_PATTERNS: [&str; 3] = ["ticket_ids", "timestamps", "ip_addresses"];

/// Pattern names requested for `category`.
pub fn target_patterns(category: Category) -> Vec<&'static str> {
    let extra: &[&str] = match category {
        Category::Alert => &["error_codes", "service_names", "severity_indicators"],
        Category::Ticket => &["component_names", "version_numbers"],
        Category::LogQuery => &["application_names", "log_levels"],
        Category::Hybrid => &["error_codes", "service_names", "application_names"],
        Category::Unknown => &[],
    };
    BASE_PATTERNS.iter().chain(extra).copied().collect()
}

pub struct PatternExtractor {
    executor: Arc<dyn TaskExecutor>,
}

impl PatternExtractor {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self { executor }
    }

    /// Patterns found in `text`, keyed by pattern name. Any failure yields an
    /// empty map.
    pub async fn extract(&self, text: &str, classification: &ClassificationResult) -> Map<String, Value> {
        match self.try_extract(text, classification.category).await {
            Ok(found) => {
                debug!(keys = found.len(), "pattern extraction finished");
                found
            }
            Err(e) => {
                warn!(error = %e, "pattern extraction failed, continuing without it");
                Map::new()
            }
        }
    }

    async fn try_extract(&self, text: &str, category: Category) -> Result<Map<String, Value>> {
        let mut params = Parameters::new();
        params.insert("input_text".to_string(), Value::String(text.to_string()));
        params.insert(
            "target_patterns".to_string(),
            serde_json::to_value(target_patterns(category))?,
        );
        let output = execute_guarded(self.executor.as_ref(), PATTERN_EXTRACTION, &params).await?;
        decode_output_object(&output)
    }
}
