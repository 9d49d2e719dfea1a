//! Response normalization.
//!
//! Language models are asked to reply with a JSON object, but they often wrap
//! it in prose, drop keys, or change value types. [`normalize`] turns such a
//! reply into either a fully populated [`AnalysisResult`] or a
//! [`ParseFailure`] carrying the original text.
//!
//! # Algorithm
//!
//! 1. Parse the whole reply as a JSON object.
//! 2. Failing that, parse the span from the first `{` to the last `}`.
//! 3. If neither yields an object, the reply is a [`ParseFailure`].
//! 4. Otherwise read each expected key, falling back to `"N/A"` for scalar
//!    fields and to an empty list for list fields.
//!
//! A JSON `null` is treated the same as a missing key. List fields that hold
//! a single non-array value become a one-element list. Other non-string
//! values keep their JSON spelling, so booleans read `true` and `false`
//! (lowercase) and objects become compact JSON text.
//!
//! # Example
//!
//! ```rust
//! use resume_analyzer::models::{FieldSet, Normalized};
//! use resume_analyzer::normalize::normalize;
//!
//! let raw = r#"Sure! {"score": 72, "improvements": "Quantify results"}"#;
//! match normalize(raw, FieldSet::default()) {
//!     Normalized::Analysis(result) => {
//!         assert_eq!(result.score, "72");
//!         assert_eq!(result.improvements, vec!["Quantify results"]);
//!         assert!(result.skill_suggestions.is_empty());
//!     }
//!     Normalized::ParseFailure(_) => unreachable!(),
//! }
//! ```

use serde_json::{Map, Value};

use crate::models::{AnalysisResult, FieldSet, Normalized, ParseFailure, NOT_AVAILABLE};

const SCORE_KEY: &str = "score";
const JOB_MATCH_KEY: &str = "job_match";
const IMPROVEMENTS_KEY: &str = "improvements";
const SKILL_SUGGESTIONS_KEY: &str = "skill_suggestions";

/// Normalize a raw model reply into a typed outcome.
pub fn normalize(raw: &str, fields: FieldSet) -> Normalized {
    match parse_whole(raw).or_else(|| parse_braced_span(raw)) {
        Some(candidate) => Normalized::Analysis(build_result(&candidate, fields)),
        None => Normalized::ParseFailure(ParseFailure::new(raw)),
    }
}

fn parse_whole(raw: &str) -> Option<Map<String, Value>> {
    parse_object(raw)
}

fn parse_braced_span(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if start >= end {
        return None;
    }
    parse_object(&raw[start..=end])
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn build_result(candidate: &Map<String, Value>, fields: FieldSet) -> AnalysisResult {
    AnalysisResult {
        score: text_field(candidate, SCORE_KEY),
        job_match: fields
            .job_match
            .then(|| text_field(candidate, JOB_MATCH_KEY)),
        improvements: list_field(candidate, IMPROVEMENTS_KEY),
        skill_suggestions: list_field(candidate, SKILL_SUGGESTIONS_KEY),
    }
}

fn present<'a>(candidate: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    candidate.get(key).filter(|v| !v.is_null())
}

fn text_field(candidate: &Map<String, Value>, key: &str) -> String {
    present(candidate, key)
        .map(value_to_text)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn list_field(candidate: &Map<String, Value>, key: &str) -> Vec<String> {
    match present(candidate, key) {
        Some(Value::Array(items)) => items.iter().map(value_to_text).collect(),
        Some(other) => vec![value_to_text(other)],
        None => Vec::new(),
    }
}

/// Text form of a JSON value: strings verbatim, everything else as compact JSON.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
