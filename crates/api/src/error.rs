use std::path::PathBuf;
use std::time::Duration;

use cromwell_types::WorkflowStatus;
use cromwell_util::{ArchiveError, LabelValidationError, LoadError};
use thiserror::Error;

use crate::auth::CredentialShape;

/// Failures while resolving credentials or minting a bearer token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("expected exactly one credential shape, detected {}", describe_shapes(.detected))]
    CredentialAmbiguity { detected: Vec<CredentialShape> },

    #[error("invalid url '{url}': it must start with http:// or https://")]
    InvalidUrl { url: String },

    #[error("cannot use secrets file {path}: {reason}")]
    SecretsFile { path: PathBuf, reason: String },

    #[error("cannot use service account key: {reason}")]
    ServiceAccountKey { reason: String },

    #[error("token request to {token_uri} failed: {reason}")]
    TokenRequest { token_uri: String, reason: String },

    #[error("failed to sign token assertion: {0}")]
    TokenSigning(#[from] jsonwebtoken::errors::Error),
}

fn describe_shapes(detected: &[CredentialShape]) -> String {
    if detected.is_empty() {
        return "none".to_string();
    }
    detected.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Every failure a client operation can report.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("label validation failed:\n{0}")]
    LabelValidation(#[from] LabelValidationError),

    /// The status endpoint answered with something other than 200.
    #[error("status lookup for workflow {workflow_id} returned HTTP {status_code}")]
    WorkflowUnknown { workflow_id: String, status_code: u16 },

    #[error("workflow {workflow_id} ended with status {status}")]
    WorkflowFailed { workflow_id: String, status: WorkflowStatus },

    #[error("timed out after {timeout:?} waiting for workflows to finish")]
    WorkflowTimeout { timeout: Duration },

    #[error("server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
