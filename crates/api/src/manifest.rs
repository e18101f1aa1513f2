//! Assemble the multipart submission for `POST /api/workflows/v1`.

use std::collections::BTreeMap;

use cromwell_types::manifest::{
    COLLECTION_NAME, LABELS, WORKFLOW_DEPENDENCIES, WORKFLOW_ON_HOLD, WORKFLOW_OPTIONS, WORKFLOW_SOURCE,
};
use cromwell_types::{Dependencies, FileSource, ServiceAccountKey, SubmissionManifest, inputs_part_name};
use cromwell_util::{build_zip, load, load_to_map};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ApiError, ApiResult};

/// Everything that goes into one workflow submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub wdl: FileSource,
    pub inputs: Vec<FileSource>,
    pub options: Option<FileSource>,
    pub dependencies: Option<Dependencies>,
    pub labels: Option<FileSource>,
    pub collection_name: Option<String>,
    pub on_hold: bool,
    /// Run the legacy label pre-check before sending.
    pub validate_labels: bool,
    /// Overrides the default `jes_gcs_root` for service-account submissions.
    pub execution_bucket: Option<String>,
}

impl SubmitRequest {
    pub fn new(wdl: impl Into<FileSource>) -> Self {
        Self {
            wdl: wdl.into(),
            inputs: Vec::new(),
            options: None,
            dependencies: None,
            labels: None,
            collection_name: None,
            on_hold: false,
            validate_labels: false,
            execution_bucket: None,
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FileSource>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options(mut self, options: impl Into<FileSource>) -> Self {
        self.options = Some(options.into());
        self
    }

    pub fn with_dependencies(mut self, dependencies: impl Into<Dependencies>) -> Self {
        self.dependencies = Some(dependencies.into());
        self
    }

    pub fn with_labels(mut self, labels: impl Into<FileSource>) -> Self {
        self.labels = Some(labels.into());
        self
    }

    /// Attach labels given as a map, serialized to JSON.
    pub fn with_label_map(self, labels: &BTreeMap<String, String>) -> ApiResult<Self> {
        Ok(self.with_labels(serde_json::to_vec(labels)?))
    }

    pub fn with_collection_name(mut self, collection_name: impl Into<String>) -> Self {
        self.collection_name = Some(collection_name.into());
        self
    }

    pub fn on_hold(mut self, on_hold: bool) -> Self {
        self.on_hold = on_hold;
        self
    }

    pub fn validate_labels(mut self, validate: bool) -> Self {
        self.validate_labels = validate;
        self
    }

    pub fn with_execution_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.execution_bucket = Some(bucket.into());
        self
    }
}

/// Resolve every reference in `request` and lay the parts out under their wire names.
///
/// # Errors
/// - [`ApiError::InvalidArgument`] for a bare non-zip dependency reference, or an
///   in-memory buffer inside a dependency list (it has no name to archive it under).
/// - [`ApiError::Load`] / [`ApiError::Archive`] when a part cannot be read or zipped.
pub fn prepare_workflow_manifest(request: &SubmitRequest) -> ApiResult<SubmissionManifest> {
    let mut manifest = SubmissionManifest::new();
    manifest.insert_file(WORKFLOW_SOURCE, load(&request.wdl)?);

    for (index, inputs) in request.inputs.iter().enumerate() {
        manifest.insert_file(inputs_part_name(index), load(inputs)?);
    }

    if let Some(options) = &request.options {
        manifest.insert_file(WORKFLOW_OPTIONS, load(options)?);
    }

    if let Some(labels) = &request.labels {
        manifest.insert_file(LABELS, load(labels)?);
    }

    if let Some(dependencies) = &request.dependencies
        && let Some(archive) = resolve_dependencies(dependencies)?
    {
        manifest.insert_file(WORKFLOW_DEPENDENCIES, archive);
    }

    if let Some(collection_name) = request.collection_name.as_deref().filter(|name| !name.is_empty()) {
        manifest.insert_text(COLLECTION_NAME, collection_name);
    }

    manifest.insert_text(WORKFLOW_ON_HOLD, request.on_hold.to_string());

    debug!(parts = ?manifest.names().collect::<Vec<_>>(), "prepared workflow manifest");
    Ok(manifest)
}

/// The zip archive to send as `workflowDependencies`, or `None` for an empty list.
fn resolve_dependencies(dependencies: &Dependencies) -> ApiResult<Option<Vec<u8>>> {
    match dependencies {
        Dependencies::Single(source @ FileSource::Reference(reference)) if !source.is_zip_reference() => {
            Err(ApiError::invalid_argument(format!(
                "the dependency file path must point to a \".zip\" file, or be given as a list of WDL files: {reference}"
            )))
        }
        Dependencies::Single(source) => Ok(Some(load(source)?)),
        Dependencies::List(sources) => match sources.as_slice() {
            [] => Ok(None),
            [single] if single.is_zip_reference() => Ok(Some(load(single)?)),
            sources => {
                let references = sources
                    .iter()
                    .map(|source| {
                        source.as_reference().ok_or_else(|| {
                            ApiError::invalid_argument("dependency lists must contain file paths or URLs, not in-memory buffers")
                        })
                    })
                    .collect::<ApiResult<Vec<_>>>()?;
                let contents = load_to_map(references)?;
                Ok(Some(build_zip(&contents)?))
            }
        },
    }
}

/// Default execution root for a project on the JES backend.
pub fn default_execution_bucket(project_id: &str) -> String {
    format!("gs://{project_id}-cromwell-execution/caas-cromwell-executions")
}

/// Merge the service-account specific JES backend keys into a workflow options document.
///
/// Existing keys are preserved. `jes_gcs_root` is taken from `execution_bucket`
/// when given, otherwise kept from `options` if already set, otherwise derived
/// from the key's project.
pub fn compose_oauth_options_for_jes_backend(
    options: Option<&[u8]>,
    key: &ServiceAccountKey,
    execution_bucket: Option<&str>,
) -> ApiResult<Vec<u8>> {
    let mut document = match options {
        None => Map::new(),
        Some(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
        Some(bytes) => match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(document) => document,
            other => {
                return Err(ApiError::invalid_argument(format!(
                    "workflow options must be a JSON object, got {}",
                    json_kind(&other)
                )));
            }
        },
    };

    let gcs_root = match execution_bucket {
        Some(bucket) => Some(bucket.to_string()),
        None if document.contains_key("jes_gcs_root") => None,
        None => Some(default_execution_bucket(&key.project_id)),
    };
    if let Some(gcs_root) = gcs_root {
        document.insert("jes_gcs_root".into(), Value::String(gcs_root));
    }
    document.insert("google_project".into(), Value::String(key.project_id.clone()));
    document.insert("google_compute_service_account".into(), Value::String(key.client_email.clone()));
    document.insert("user_service_account_json".into(), Value::String(serde_json::to_string(key)?));

    Ok(serde_json::to_vec(&Value::Object(document))?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
