//! Helpers shared by the Cromwell API client and CLI.
//!
//! - [`resource`]: resolve a [`cromwell_types::FileSource`] to bytes
//! - [`archive`]: bundle named buffers into an in-memory zip
//! - [`labels`]: the opt-in, legacy label pre-check
//! - [`redact`]: scrub credentials from strings before they are logged

pub mod archive;
pub mod error;
pub mod labels;
pub mod redact;
pub mod resource;

pub use archive::{build_zip, extract_zip};
pub use error::{ArchiveError, LabelValidationError, LoadError};
pub use labels::{decode_labels, validate_labels};
pub use redact::{redact_json, redact_sensitive};
pub use resource::{expand_tilde, is_remote_reference, load, load_reference, load_to_map};
