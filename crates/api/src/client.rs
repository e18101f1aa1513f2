//! Blocking client for the Cromwell REST API.
//!
//! Every operation returns a [`CromwellResponse`] holding the status code and
//! body. Only submission checks the status itself, because a non-2xx answer is
//! what drives its retry; everything else leaves that to the caller through
//! [`CromwellResponse::error_for_status`].

use std::collections::BTreeMap;

use cromwell_types::manifest::{LABELS, WORKFLOW_OPTIONS};
use cromwell_types::{LabelSource, ManifestPart, SubmissionManifest, WorkflowStatus};
use cromwell_util::{redact_json, redact_sensitive, validate_labels};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::auth::CromwellAuth;
use crate::config::{ClientConfig, Endpoints};
use crate::error::{ApiError, ApiResult};
use crate::manifest::{SubmitRequest, compose_oauth_options_for_jes_backend, prepare_workflow_manifest};
use crate::query::compose_query_params;
use crate::wait::{WaitOptions, WorkflowStatusSource, wait_for_workflows};

/// Status code and body of a Cromwell answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CromwellResponse {
    pub status: u16,
    pub body: String,
}

impl CromwellResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx answer into [`ApiError::Http`] carrying the server's body.
    pub fn error_for_status(self) -> ApiResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Http {
                status: self.status,
                body: self.body,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Include or exclude specific metadata keys. Only one list may be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataOptions {
    pub include_keys: Vec<String>,
    pub exclude_keys: Vec<String>,
    pub expand_sub_workflows: bool,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: WorkflowStatus,
}

/// A Cromwell server reached through one [`CromwellAuth`] context.
#[derive(Debug)]
pub struct CromwellClient {
    auth: CromwellAuth,
    config: ClientConfig,
    http: Client,
}

impl CromwellClient {
    pub fn new(auth: CromwellAuth, config: ClientConfig) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { auth, config, http })
    }

    pub fn auth(&self) -> &CromwellAuth {
        &self.auth
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoints(&self) -> &Endpoints {
        &self.config.endpoints
    }

    /// Start a request against `path`, relative to the server URL, with credentials attached.
    fn request(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let url = format!("{}{}", self.auth.url(), path);
        debug!(%method, %url, "building request");

        let builder = self.http.request(method, url).header(header::ACCEPT, "application/json");
        if let Some((username, password)) = self.auth.basic_credentials() {
            return Ok(builder.basic_auth(username, Some(password)));
        }
        match self.auth.current_bearer_header()? {
            Some(bearer) => Ok(builder.header(header::AUTHORIZATION, bearer)),
            None => Ok(builder),
        }
    }

    fn send(&self, builder: RequestBuilder) -> ApiResult<CromwellResponse> {
        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        debug!(status, body = %loggable_body(&body), "received response");
        Ok(CromwellResponse { status, body })
    }

    fn send_for_workflow(&self, method: Method, template: &str, workflow_id: &str) -> ApiResult<CromwellResponse> {
        let path = Endpoints::resolve(template, workflow_id);
        self.send(self.request(method, &path)?)
    }

    /// Submit a workflow, retrying failures under the configured [`crate::RetryPolicy`].
    ///
    /// Retries can create duplicate workflows if the server accepted an
    /// earlier attempt before the connection failed.
    pub fn submit(&self, request: &SubmitRequest) -> ApiResult<CromwellResponse> {
        let mut manifest = prepare_workflow_manifest(request)?;

        if request.validate_labels
            && let Some(labels) = manifest.file(LABELS)
        {
            validate_labels(&LabelSource::Bytes(labels.to_vec()))?;
        }

        if let Some(key) = self.auth.service_key_content() {
            let options = compose_oauth_options_for_jes_backend(
                manifest.file(WORKFLOW_OPTIONS),
                key,
                request.execution_bucket.as_deref(),
            )?;
            manifest.insert_file(WORKFLOW_OPTIONS, options);
        }

        self.config.retry.run(|| {
            let builder = self.request(Method::POST, &self.endpoints().submit)?;
            self.send(builder.multipart(multipart_form(&manifest)))?.error_for_status()
        })
    }

    pub fn status(&self, workflow_id: &str) -> ApiResult<CromwellResponse> {
        self.send_for_workflow(Method::GET, &self.endpoints().status, workflow_id)
    }

    pub fn abort(&self, workflow_id: &str) -> ApiResult<CromwellResponse> {
        self.send_for_workflow(Method::POST, &self.endpoints().abort, workflow_id)
    }

    /// Move an `On Hold` workflow to `Submitted`.
    pub fn release_hold(&self, workflow_id: &str) -> ApiResult<CromwellResponse> {
        self.send_for_workflow(Method::POST, &self.endpoints().release_hold, workflow_id)
    }

    pub fn health(&self) -> ApiResult<CromwellResponse> {
        self.send(self.request(Method::GET, &self.endpoints().health)?)
    }

    /// # Errors
    /// [`ApiError::InvalidArgument`] when both include and exclude keys are given.
    pub fn metadata(&self, workflow_id: &str, options: &MetadataOptions) -> ApiResult<CromwellResponse> {
        if !options.include_keys.is_empty() && !options.exclude_keys.is_empty() {
            return Err(ApiError::invalid_argument("includeKey and excludeKey cannot be used together"));
        }

        let mut params: Vec<(&str, &str)> = Vec::new();
        params.extend(options.include_keys.iter().map(|key| ("includeKey", key.as_str())));
        params.extend(options.exclude_keys.iter().map(|key| ("excludeKey", key.as_str())));
        params.push(("expandSubWorkflows", if options.expand_sub_workflows { "true" } else { "false" }));

        let path = Endpoints::resolve(&self.endpoints().metadata, workflow_id);
        self.send(self.request(Method::GET, &path)?.query(&params))
    }

    /// Query workflows. See [`compose_query_params`] for the accepted keys.
    pub fn query(&self, query: &Map<String, Value>) -> ApiResult<CromwellResponse> {
        let params = compose_query_params(query)?;
        self.send(self.request(Method::POST, &self.endpoints().query)?.json(&params))
    }

    pub fn patch_labels(&self, workflow_id: &str, labels: &BTreeMap<String, String>) -> ApiResult<CromwellResponse> {
        let path = Endpoints::resolve(&self.endpoints().labels, workflow_id);
        self.send(self.request(Method::PATCH, &path)?.json(labels))
    }

    /// Poll until all workflows succeed. See [`wait_for_workflows`].
    pub fn wait<I: AsRef<str>>(&self, workflow_ids: &[I], options: &WaitOptions) -> ApiResult<()> {
        wait_for_workflows(self, workflow_ids, options)
    }
}

impl WorkflowStatusSource for CromwellClient {
    fn workflow_status(&self, workflow_id: &str) -> ApiResult<WorkflowStatus> {
        let response = self.status(workflow_id)?;
        if response.status != 200 {
            warn!(workflow_id, status = response.status, "workflow status could not be determined");
            return Err(ApiError::WorkflowUnknown {
                workflow_id: workflow_id.to_string(),
                status_code: response.status,
            });
        }
        Ok(response.json::<StatusBody>()?.status)
    }
}

/// A response body with credentials scrubbed. JSON bodies are redacted field by field.
fn loggable_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => redact_json(&value).to_string(),
        Err(_) => redact_sensitive(body),
    }
}

/// Build the multipart body. File parts are named after their field.
fn multipart_form(manifest: &SubmissionManifest) -> Form {
    manifest.iter().fold(Form::new(), |form, (name, part)| match part {
        ManifestPart::File(content) => form.part(name.to_string(), Part::bytes(content.clone()).file_name(name.to_string())),
        ManifestPart::Text(value) => form.text(name.to_string(), value.clone()),
    })
}
