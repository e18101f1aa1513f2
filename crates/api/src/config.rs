//! Client configuration and the optional user config file.
//!
//! [`ClientConfig`] is passed explicitly to every client; nothing here is
//! global. [`UserConfig`] is the JSON file the CLI reads for defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cromwell_util::expand_tilde;
use dirs_next::config_dir;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tracing::warn;

use crate::retry::RetryPolicy;

/// Environment variable overriding the user config file location.
pub const CONFIG_PATH_ENV: &str = "CROMWELL_TOOLS_CONFIG";

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Placeholder substituted with the workflow id in endpoint templates.
pub const ID_PLACEHOLDER: &str = "{id}";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// REST path templates, relative to the server base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub submit: String,
    pub status: String,
    pub abort: String,
    pub release_hold: String,
    pub metadata: String,
    pub query: String,
    pub labels: String,
    pub health: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            submit: "/api/workflows/v1".into(),
            status: "/api/workflows/v1/{id}/status".into(),
            abort: "/api/workflows/v1/{id}/abort".into(),
            release_hold: "/api/workflows/v1/{id}/releaseHold".into(),
            metadata: "/api/workflows/v1/{id}/metadata".into(),
            query: "/api/workflows/v1/query".into(),
            labels: "/api/workflows/v1/{id}/labels".into(),
            health: "/engine/v1/status".into(),
        }
    }
}

impl Endpoints {
    /// Substitute a percent-encoded workflow id into `template`.
    pub fn resolve(template: &str, workflow_id: &str) -> String {
        let encoded = utf8_percent_encode(workflow_id, PATH_SEGMENT).to_string();
        template.replace(ID_PLACEHOLDER, &encoded)
    }
}

/// Everything a [`crate::CromwellClient`] needs besides credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            user_agent: format!("cromwell-tools/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        }
    }
}

impl ClientConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Defaults read from the user's config file. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserConfig {
    pub url: Option<String>,
    pub secrets_file: Option<PathBuf>,
    pub service_account_key: Option<PathBuf>,
    pub request_timeout_seconds: Option<u64>,
    pub timeout_minutes: Option<u64>,
    pub poll_interval_seconds: Option<u64>,
}

impl UserConfig {
    /// Load from `$CROMWELL_TOOLS_CONFIG` or the platform config directory.
    pub fn load() -> Self {
        Self::load_from(&default_config_path())
    }

    /// Load from `path`. Missing, unreadable, or malformed files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "Failed to read config file; using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str(&data) {
            Ok(config) => config,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "Failed to parse config file; using defaults");
                Self::default()
            }
        }
    }

    /// Apply file-level settings that belong to the client itself.
    pub fn apply_to(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(seconds) = self.request_timeout_seconds {
            config.request_timeout = Duration::from_secs(seconds);
        }
        config
    }
}

/// Where [`UserConfig::load`] looks.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cromwell-tools")
        .join(CONFIG_FILE_NAME)
}
