//! Strict-JSON handling for role outputs.
//!
//! Models occasionally wrap JSON in markdown fences or prepend chatter;
//! [`sanitize_json_block`] strips that before parsing. Unlike the tolerant
//! retrieval-side parsers, a parse failure here is a **role failure**: the
//! pipeline treats a schema-invalid generation the same as a failed call.

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::errors::{PipelineError, PipelineResult};

/// Remove markdown fences and pre/post text; extract the first JSON object.
pub fn sanitize_json_block(s: &str) -> String {
    let no_fence = s
        .replace("```json", "")
        .replace("```", "")
        .replace('\u{feff}', "")
        .trim()
        .to_string();

    if let (Some(start), Some(end)) = (no_fence.find('{'), no_fence.rfind('}')) {
        let candidate = &no_fence[start..=end];
        if candidate.contains(':') {
            return candidate.to_string();
        }
    }
    no_fence
}

/// Sanitizes and parses one role's structured output.
pub fn parse_structured<T: DeserializeOwned>(role: &'static str, raw: &str) -> PipelineResult<T> {
    let cleaned = sanitize_json_block(raw);
    serde_json::from_str::<T>(&cleaned).map_err(|e| {
        warn!(
            target: "review_pipeline::json",
            role,
            error = %e,
            "structured output failed to parse"
        );
        PipelineError::Schema {
            role,
            detail: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn strips_fences_and_chatter() {
        let raw = "Sure, here is the JSON:\n```json\n{\"value\": 7}\n```\nHope that helps!";
        let parsed: Sample = parse_structured("test", raw).unwrap();
        assert_eq!(parsed.value, 7);
    }

    #[test]
    fn plain_json_passes_through() {
        let parsed: Sample = parse_structured("test", "{\"value\": 3}").unwrap();
        assert_eq!(parsed.value, 3);
    }

    #[test]
    fn garbage_is_a_schema_error() {
        let out = parse_structured::<Sample>("test", "I could not produce JSON, sorry");
        assert!(matches!(out, Err(PipelineError::Schema { .. })));
    }
}
