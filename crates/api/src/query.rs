//! Flatten a query dictionary into the parameter list `POST …/query` expects.

use cromwell_types::QueryParameter;
use indexmap::IndexSet;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};

/// Keys that may carry a single value only.
pub const EXCLUSIVE_QUERY_KEYS: &[&str] = &["end", "includeSubworkflows", "start", "submission", "page", "pageSize"];

/// Keys that may be repeated.
pub const INCLUSIVE_QUERY_KEYS: &[&str] = &[
    "additionalQueryResultFields",
    "excludeLabelAnd",
    "excludeLabelOr",
    "id",
    "includeSubworkflows",
    "label",
    "labelor",
    "name",
    "status",
];

const UNSCALABLE_QUERY_KEYS: &[&str] = &["additionalQueryResultFields", "includeSubworkflows"];

fn is_recognized(key: &str) -> bool {
    EXCLUSIVE_QUERY_KEYS.contains(&key) || INCLUSIVE_QUERY_KEYS.contains(&key)
}

/// Turn `{"status": ["Running", "Failed"], "label": {"k": "v"}}` into
/// `[{"status": "Running"}, {"status": "Failed"}, {"label": "k:v"}]`.
///
/// Unrecognized keys are dropped with an `info!` notice. Duplicate values in a
/// list are sent once, in first-seen order. Non-string values are sent as
/// their JSON text (`true`, `10`, ...).
///
/// # Errors
/// [`ApiError::InvalidArgument`] when a list is given for an exclusive key.
pub fn compose_query_params(query: &Map<String, Value>) -> ApiResult<Vec<QueryParameter>> {
    if UNSCALABLE_QUERY_KEYS.iter().any(|key| query.contains_key(*key)) {
        warn!(
            "Note: additionalQueryResultFields, includeSubworkflows may not scale due to the following issues \
             with Cromwell: https://github.com/broadinstitute/cromwell/issues/3115 and \
             https://github.com/broadinstitute/cromwell/issues/3873"
        );
    }

    let mut params = Vec::new();
    for (key, value) in query {
        if !is_recognized(key) {
            info!(key = %key, "not an allowed query key in Cromwell; ignoring it");
            continue;
        }

        match value {
            Value::Object(labels) if key == "label" => {
                params.extend(
                    labels
                        .iter()
                        .map(|(label_key, label_value)| QueryParameter::new(key, format!("{label_key}:{}", scalar_text(label_value)))),
                );
            }
            Value::Array(values) => {
                if EXCLUSIVE_QUERY_KEYS.contains(&key.as_str()) {
                    return Err(ApiError::invalid_argument(format!("{key} cannot be specified multiple times!")));
                }
                let unique: IndexSet<String> = values.iter().map(scalar_text).collect();
                params.extend(unique.into_iter().map(|text| QueryParameter::new(key, text)));
            }
            other => params.push(QueryParameter::new(key, scalar_text(other))),
        }
    }
    Ok(params)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compose(value: Value) -> ApiResult<Vec<QueryParameter>> {
        compose_query_params(value.as_object().unwrap())
    }

    #[test]
    fn flattens_lists_and_labels() {
        let params = compose(json!({"status": ["Running", "Failed"], "label": {"k": "v"}})).unwrap();
        assert_eq!(params.len(), 3);
        assert!(params.contains(&QueryParameter::new("status", "Running")));
        assert!(params.contains(&QueryParameter::new("status", "Failed")));
        assert!(params.contains(&QueryParameter::new("label", "k:v")));
    }

    #[test]
    fn lists_on_exclusive_keys_are_rejected() {
        let error = compose(json!({"start": ["t1", "t2"]})).unwrap_err();
        assert!(matches!(error, ApiError::InvalidArgument { ref message } if message.contains("start")));
    }

    #[test]
    fn non_strings_are_json_encoded() {
        let params = compose(json!({"includeSubworkflows": true, "pageSize": 10})).unwrap();
        assert!(params.contains(&QueryParameter::new("includeSubworkflows", "true")));
        assert!(params.contains(&QueryParameter::new("pageSize", "10")));
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let params = compose(json!({"colour": "blue", "name": "WorkflowName1"})).unwrap();
        assert_eq!(params, vec![QueryParameter::new("name", "WorkflowName1")]);
    }

    #[test]
    fn duplicate_list_values_are_sent_once_in_order() {
        let params = compose(json!({"name": ["b", "a", "b"]})).unwrap();
        assert_eq!(params, vec![QueryParameter::new("name", "b"), QueryParameter::new("name", "a")]);
    }
}
