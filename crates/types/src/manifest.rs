//! The multipart submission manifest.
//!
//! A [`SubmissionManifest`] maps Cromwell's multipart field names to either
//! file content or a scalar text value. Insertion order is preserved so the
//! numbered inputs parts go out in the order the caller supplied them.

use indexmap::IndexMap;

pub const WORKFLOW_SOURCE: &str = "workflowSource";
pub const WORKFLOW_INPUTS: &str = "workflowInputs";
pub const WORKFLOW_OPTIONS: &str = "workflowOptions";
pub const WORKFLOW_DEPENDENCIES: &str = "workflowDependencies";
pub const LABELS: &str = "labels";
pub const COLLECTION_NAME: &str = "collectionName";
pub const WORKFLOW_ON_HOLD: &str = "workflowOnHold";

/// Field name for the inputs file at `index` (zero-based).
///
/// The first inputs file is `workflowInputs`; later ones are numbered from 2:
/// `workflowInputs_2`, `workflowInputs_3`, ...
pub fn inputs_part_name(index: usize) -> String {
    if index == 0 {
        WORKFLOW_INPUTS.to_string()
    } else {
        format!("{WORKFLOW_INPUTS}_{}", index + 1)
    }
}

/// A single part of the multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestPart {
    /// Uploaded as a file part.
    File(Vec<u8>),
    /// Sent as a plain text field.
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionManifest {
    parts: IndexMap<String, ManifestPart>,
}

impl SubmissionManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file part, keeping the original position on replace.
    pub fn insert_file(&mut self, name: impl Into<String>, content: Vec<u8>) {
        self.parts.insert(name.into(), ManifestPart::File(content));
    }

    /// Insert or replace a text part.
    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.insert(name.into(), ManifestPart::Text(value.into()));
    }

    /// Bytes of a file part, if `name` is present and is a file.
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        match self.parts.get(name) {
            Some(ManifestPart::File(content)) => Some(content.as_slice()),
            _ => None,
        }
    }

    /// Value of a text part, if `name` is present and is text.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.parts.get(name) {
            Some(ManifestPart::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// Part names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManifestPart)> {
        self.parts.iter().map(|(name, part)| (name.as_str(), part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_parts_are_numbered_from_two() {
        assert_eq!(inputs_part_name(0), "workflowInputs");
        assert_eq!(inputs_part_name(1), "workflowInputs_2");
        assert_eq!(inputs_part_name(4), "workflowInputs_5");
    }

    #[test]
    fn replacing_a_part_keeps_its_position() {
        let mut manifest = SubmissionManifest::new();
        manifest.insert_file(WORKFLOW_SOURCE, b"wdl".to_vec());
        manifest.insert_file(WORKFLOW_OPTIONS, b"{}".to_vec());
        manifest.insert_text(WORKFLOW_ON_HOLD, "false");
        manifest.insert_file(WORKFLOW_OPTIONS, br#"{"a":1}"#.to_vec());

        let names: Vec<_> = manifest.names().collect();
        assert_eq!(names, vec![WORKFLOW_SOURCE, WORKFLOW_OPTIONS, WORKFLOW_ON_HOLD]);
        assert_eq!(manifest.file(WORKFLOW_OPTIONS), Some(&br#"{"a":1}"#[..]));
        assert_eq!(manifest.text(WORKFLOW_ON_HOLD), Some("false"));
        assert_eq!(manifest.file(WORKFLOW_ON_HOLD), None);
    }
}
