//! Shared type definitions for the Cromwell client crates.
//!
//! Everything in this crate is plain data: references to workflow files,
//! the assembled submission manifest, workflow statuses reported by the
//! server, and the credential documents read from disk. No I/O happens here;
//! resolution of references into bytes lives in `cromwell-util` and the
//! HTTP surface lives in `cromwell-api`.

pub mod credentials;
pub mod manifest;
pub mod query;
pub mod source;
pub mod status;

pub use credentials::{SecretsFile, ServiceAccountKey};
pub use manifest::{ManifestPart, SubmissionManifest, inputs_part_name};
pub use query::QueryParameter;
pub use source::{Dependencies, FileSource, LabelSource};
pub use status::WorkflowStatus;
