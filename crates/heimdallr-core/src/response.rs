//! Best-effort decoding of executor responses.
//!
//! Model-backed executors return free text that usually, but not always,
//! embeds one JSON object. The scraper takes the slice between the first `{`
//! and the last `}` and tries to decode it. Known failure mode: text holding
//! two separate objects (`{..} and {..}`) yields a slice that is not valid
//! JSON, and the caller falls back to its degraded path.

use serde_json::{Map, Value};

use crate::domain::error::{HeimdallrError, Result};
use crate::executor::TaskOutput;

/// Slice between the first `{` and the last `}` inclusive, if both exist in
/// that order.
pub fn embedded_json_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Decode the embedded JSON object in `text`.
pub fn decode_embedded_object(text: &str) -> Result<Map<String, Value>> {
    let slice = embedded_json_slice(text)
        .ok_or_else(|| HeimdallrError::ResponseParse("no JSON object in response".to_string()))?;
    match serde_json::from_str::<Value>(slice)? {
        Value::Object(map) => Ok(map),
        other => Err(HeimdallrError::ResponseParse(format!(
            "expected JSON object, got {other}"
        ))),
    }
}

/// Turn executor output into a step payload.
///
/// Structured objects pass through, other structured values are wrapped as
/// `{"value": ..}`, raw text is scraped and otherwise kept as
/// `{"raw_output": text}`.
pub fn normalize_output(output: TaskOutput) -> Map<String, Value> {
    match output {
        TaskOutput::Structured(Value::Object(map)) => map,
        TaskOutput::Structured(other) => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
        TaskOutput::Raw(text) => match decode_embedded_object(&text) {
            Ok(map) => map,
            Err(e) => {
                tracing::debug!(error = %e, "keeping raw step output");
                let mut map = Map::new();
                map.insert("raw_output".to_string(), Value::String(text));
                map
            }
        },
    }
}

/// Decode executor output that must carry a JSON object. Unlike
/// [`normalize_output`] there is no raw-text fallback.
pub fn decode_output_object(output: &TaskOutput) -> Result<Map<String, Value>> {
    match output {
        TaskOutput::Structured(Value::Object(map)) => Ok(map.clone()),
        TaskOutput::Structured(Value::String(text)) | TaskOutput::Raw(text) => {
            decode_embedded_object(text)
        }
        TaskOutput::Structured(other) => decode_embedded_object(&other.to_string()),
    }
}
