//! Cromwell workflow server client.
//!
//! The pieces, in the order a submission uses them:
//!
//! - [`auth`]: turn credential inputs into exactly one [`CromwellAuth`] context
//! - [`manifest`]: resolve workflow files and lay out the multipart body
//! - [`client`]: the REST operations, with submission retried per [`RetryPolicy`]
//! - [`wait`]: poll statuses until workflows finish
//!
//! ```no_run
//! use cromwell_api::{ClientConfig, CromwellAuth, CromwellClient, SubmitRequest, WaitOptions};
//!
//! # fn main() -> Result<(), cromwell_api::ApiError> {
//! let auth = CromwellAuth::from_user_password("user", "pass", "https://cromwell.example.org/")?;
//! let client = CromwellClient::new(auth, ClientConfig::default())?;
//! let response = client.submit(&SubmitRequest::new("hello.wdl").with_inputs(["hello.inputs.json"]))?;
//! let submitted: serde_json::Value = response.json()?;
//! if let Some(id) = submitted["id"].as_str() {
//!     client.wait(&[id], &WaitOptions::default())?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod manifest;
pub mod query;
pub mod retry;
pub mod wait;

pub use auth::{CredentialInputs, CredentialShape, CromwellAuth, ServiceAccountKeySource, TokenProvider};
pub use client::{CromwellClient, CromwellResponse, MetadataOptions};
pub use config::{ClientConfig, Endpoints, UserConfig};
pub use error::{ApiError, ApiResult, AuthError};
pub use manifest::{SubmitRequest, compose_oauth_options_for_jes_backend, prepare_workflow_manifest};
pub use query::compose_query_params;
pub use retry::RetryPolicy;
pub use wait::{WaitOptions, WorkflowStatusSource, wait_for_workflows};
