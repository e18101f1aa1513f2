use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// One flat query parameter for `POST /api/workflows/v1/query`.
///
/// Cromwell expects the body as a list of single-entry objects, e.g.
/// `[{"status": "Running"}, {"status": "Failed"}]`, so this serializes as a
/// one-key map rather than as a struct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryParameter {
    pub key: String,
    pub value: String,
}

impl QueryParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Serialize for QueryParameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.value)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_single_entry_object() {
        let params = vec![QueryParameter::new("status", "Running"), QueryParameter::new("label", "k:v")];
        let encoded = serde_json::to_string(&params).unwrap();
        assert_eq!(encoded, r#"[{"status":"Running"},{"label":"k:v"}]"#);
    }
}
