//! Inputs that may be given either as a reference or as in-memory content.
//!
//! Workflow sources, inputs, options and labels can all be supplied as a
//! path, an http(s) URL, or a buffer already holding bytes. Instead of
//! sniffing types at each call site, callers wrap them in [`FileSource`] and
//! the resource loader normalizes every variant to bytes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A "file-like" input: bytes already in memory or a reference to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Content already held in memory. Returned unchanged by the loader.
    Bytes(Vec<u8>),
    /// A local filesystem path or an `http://`/`https://` URL.
    Reference(String),
}

impl FileSource {
    /// Returns the reference string when this source is not an in-memory buffer.
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Self::Reference(reference) => Some(reference.as_str()),
            Self::Bytes(_) => None,
        }
    }

    /// True when the source is a reference whose name ends with `.zip`.
    pub fn is_zip_reference(&self) -> bool {
        self.as_reference()
            .map(|reference| reference.to_ascii_lowercase().ends_with(".zip"))
            .unwrap_or(false)
    }
}

impl From<&str> for FileSource {
    fn from(value: &str) -> Self {
        Self::Reference(value.to_string())
    }
}

impl From<String> for FileSource {
    fn from(value: String) -> Self {
        Self::Reference(value)
    }
}

impl From<&Path> for FileSource {
    fn from(value: &Path) -> Self {
        Self::Reference(value.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for FileSource {
    fn from(value: PathBuf) -> Self {
        Self::from(value.as_path())
    }
}

impl From<Vec<u8>> for FileSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for FileSource {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

/// Workflow dependencies in one of the accepted shapes.
///
/// - `Single` must point at (or hold) a zip archive; a bare non-zip reference
///   is rejected by the manifest composer.
/// - `List` with exactly one `.zip` reference is treated like `Single`.
/// - Any other `List` is bundled into a freshly built zip archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependencies {
    Single(FileSource),
    List(Vec<FileSource>),
}

impl From<FileSource> for Dependencies {
    fn from(value: FileSource) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<FileSource>> for Dependencies {
    fn from(value: Vec<FileSource>) -> Self {
        Self::List(value)
    }
}

/// Label maps accepted by the label validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSource {
    /// An already-decoded key/value map.
    Map(BTreeMap<String, String>),
    /// A JSON object encoded as a string.
    Json(String),
    /// A JSON object encoded as UTF-8 bytes.
    Bytes(Vec<u8>),
}

impl From<BTreeMap<String, String>> for LabelSource {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self::Map(value)
    }
}

impl From<Vec<u8>> for LabelSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_references_are_detected_case_insensitively() {
        assert!(FileSource::from("deps/bundle.zip").is_zip_reference());
        assert!(FileSource::from("https://host/deps/BUNDLE.ZIP").is_zip_reference());
        assert!(!FileSource::from("tasks.wdl").is_zip_reference());
        assert!(!FileSource::from(b"PK\x03\x04".to_vec()).is_zip_reference());
    }

    #[test]
    fn paths_become_references() {
        let source = FileSource::from(PathBuf::from("/tmp/workflow.wdl"));
        assert_eq!(source.as_reference(), Some("/tmp/workflow.wdl"));
    }
}
