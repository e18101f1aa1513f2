use std::path::PathBuf;

use thiserror::Error;

/// Failures while resolving a file-like reference into bytes.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("resource not found: '{reference}' is neither a readable local file nor an http(s) URL")]
    ResourceNotFound { reference: String },

    #[error("fetching {url} failed with status {status}: {body}")]
    RemoteFetch { url: String, status: u16, body: String },

    #[error("fetching {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }
}

/// Failures while building or reading an in-memory zip archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot derive an archive entry name from '{name}'")]
    InvalidEntryName { name: String },

    #[error("duplicate archive entry '{name}'")]
    DuplicateEntry { name: String },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by the label pre-check.
#[derive(Debug, Error)]
pub enum LabelValidationError {
    /// Every violation found, one per line.
    #[error("{message}")]
    Invalid { message: String },

    /// The labels could not be decoded into a string-to-string map.
    #[error("labels must be a JSON object of string values: {reason}")]
    Malformed { reason: String },
}
