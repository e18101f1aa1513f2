//! Legacy client-side label validation.
//!
//! These rules come from Cromwell releases before v32, which limited label
//! keys and values to lowercase DNS-label-like strings of at most 63
//! characters. Current servers validate labels themselves with looser rules,
//! so this check is opt-in and kept only for compatibility with older
//! deployments.

use std::collections::BTreeMap;

use cromwell_types::LabelSource;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::LabelValidationError;

pub const LABEL_MAX_LENGTH: usize = 63;
pub const LABEL_KEY_PATTERN: &str = "[a-z]([-a-z0-9]*[a-z0-9])?";
pub const LABEL_VALUE_PATTERN: &str = "([a-z0-9]*[-a-z0-9]*[a-z0-9])?";

static LABEL_KEY_REGEX: Lazy<Regex> = Lazy::new(|| full_match_regex(LABEL_KEY_PATTERN));
static LABEL_VALUE_REGEX: Lazy<Regex> = Lazy::new(|| full_match_regex(LABEL_VALUE_PATTERN));

fn full_match_regex(pattern: &str) -> Regex {
    Regex::new(&format!("^(?:{pattern})$")).expect("label pattern is a valid regex")
}

/// Check every label key and value, reporting all violations at once.
///
/// # Errors
/// - [`LabelValidationError::Malformed`] when the input cannot be decoded to a
///   string-to-string map.
/// - [`LabelValidationError::Invalid`] with one line per violation otherwise.
pub fn validate_labels(source: &LabelSource) -> Result<(), LabelValidationError> {
    warn!(
        "label pre-validation follows pre-v32 Cromwell rules and is deprecated; \
         see https://cromwell.readthedocs.io/en/stable/Labels/ for current limits"
    );

    let labels = decode_labels(source)?;
    let mut message = String::new();
    for (key, value) in &labels {
        message.push_str(&pattern_violation(&LABEL_KEY_REGEX, LABEL_KEY_PATTERN, key));
        message.push_str(&pattern_violation(&LABEL_VALUE_REGEX, LABEL_VALUE_PATTERN, value));
        message.push_str(&length_violation(key));
        message.push_str(&length_violation(value));
    }

    if message.is_empty() {
        Ok(())
    } else {
        Err(LabelValidationError::Invalid { message })
    }
}

/// Decode any accepted label representation into a key/value map.
pub fn decode_labels(source: &LabelSource) -> Result<BTreeMap<String, String>, LabelValidationError> {
    let object: Map<String, Value> = match source {
        LabelSource::Map(labels) => return Ok(labels.clone()),
        LabelSource::Json(text) => serde_json::from_str(text).map_err(malformed)?,
        LabelSource::Bytes(bytes) => serde_json::from_slice(bytes).map_err(malformed)?,
    };

    object
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(value) => Ok((key, value)),
            other => Err(LabelValidationError::Malformed {
                reason: format!("value for '{key}' is {other}, not a string"),
            }),
        })
        .collect()
}

fn malformed(error: serde_json::Error) -> LabelValidationError {
    LabelValidationError::Malformed {
        reason: error.to_string(),
    }
}

fn pattern_violation(regex: &Regex, pattern: &str, content: &str) -> String {
    if regex.is_match(content) {
        String::new()
    } else {
        format!("Invalid label: {content} did not match the regex {pattern}.\n")
    }
}

fn length_violation(content: &str) -> String {
    let length = content.chars().count();
    if length > LABEL_MAX_LENGTH {
        format!("Invalid label: {content} has {length} characters. The maximum is {LABEL_MAX_LENGTH}.\n")
    } else {
        String::new()
    }
}
