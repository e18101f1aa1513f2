//! Credential resolution for a Cromwell server.
//!
//! Callers hand over whatever credential inputs they have; [`CromwellAuth::harmonize`]
//! checks that exactly one credential shape is present and builds the matching
//! context. Basic and bearer credentials never coexist on one context.

pub mod oauth;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use cromwell_types::{SecretsFile, ServiceAccountKey};
use cromwell_util::expand_tilde;
use tracing::{debug, warn};

use crate::error::AuthError;
pub use oauth::{AccessToken, OAuthCredential, ServiceAccountTokenProvider, TokenProvider};

/// One way of authenticating to a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialShape {
    /// A service-account key together with a server URL.
    ServiceAccount,
    /// A JSON secrets file holding URL, username, and password.
    SecretsFile,
    /// Username, password, and URL given directly.
    UserPassword,
    /// Only a URL.
    Anonymous,
}

impl fmt::Display for CredentialShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ServiceAccount => "service_account_key",
            Self::SecretsFile => "secrets_file",
            Self::UserPassword => "user_password",
            Self::Anonymous => "no_auth",
        };
        f.write_str(name)
    }
}

/// Where a service-account key comes from.
#[derive(Debug, Clone)]
pub enum ServiceAccountKeySource {
    Path(PathBuf),
    Parsed(ServiceAccountKey),
}

impl From<PathBuf> for ServiceAccountKeySource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<ServiceAccountKey> for ServiceAccountKeySource {
    fn from(key: ServiceAccountKey) -> Self {
        Self::Parsed(key)
    }
}

/// Raw, possibly conflicting credential inputs. Empty strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct CredentialInputs {
    pub username: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
    pub secrets_file: Option<PathBuf>,
    pub service_account_key: Option<ServiceAccountKeySource>,
}

impl CredentialInputs {
    /// Every shape these inputs satisfy, in a fixed order.
    pub fn detected_shapes(&self) -> Vec<CredentialShape> {
        let url = present(&self.url);
        let username = present(&self.username);
        let password = present(&self.password);
        let secrets_file = self.secrets_file.as_ref().is_some_and(|path| !path.as_os_str().is_empty());
        let service_account_key = self.service_account_key.is_some();

        let mut shapes = Vec::new();
        if service_account_key && url {
            shapes.push(CredentialShape::ServiceAccount);
        }
        if secrets_file {
            shapes.push(CredentialShape::SecretsFile);
        }
        if username && password && url {
            shapes.push(CredentialShape::UserPassword);
        }
        if url && !(service_account_key || secrets_file || username || password) {
            shapes.push(CredentialShape::Anonymous);
        }
        shapes
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|value| !value.trim().is_empty())
}

enum Credentials {
    Basic { username: String, password: String },
    Bearer(OAuthCredential),
    Anonymous,
}

/// A resolved authentication context: the server URL plus one credential.
pub struct CromwellAuth {
    url: String,
    credentials: Credentials,
    service_key: Option<ServiceAccountKey>,
}

impl CromwellAuth {
    /// Build the single context the inputs describe.
    ///
    /// # Errors
    /// [`AuthError::CredentialAmbiguity`] when zero or several shapes match,
    /// plus anything the chosen constructor reports.
    pub fn harmonize(inputs: CredentialInputs) -> Result<Self, AuthError> {
        let detected = inputs.detected_shapes();
        if detected.len() != 1 {
            return Err(AuthError::CredentialAmbiguity { detected });
        }
        let shape = detected[0];
        debug!(shape = %shape, "resolved credential shape");

        let url = inputs.url.unwrap_or_default();
        match (shape, inputs.service_account_key, inputs.secrets_file) {
            (CredentialShape::ServiceAccount, Some(key), _) => Self::from_service_account_key(key, &url),
            (CredentialShape::SecretsFile, _, Some(path)) => Self::from_secrets_file(&path),
            (CredentialShape::UserPassword, ..) => {
                Self::from_user_password(&inputs.username.unwrap_or_default(), &inputs.password.unwrap_or_default(), &url)
            }
            (CredentialShape::Anonymous, ..) => Self::from_no_authentication(&url),
            _ => Err(AuthError::CredentialAmbiguity { detected }),
        }
    }

    /// OAuth context from a key file or an already-parsed key. Mints the first token eagerly.
    pub fn from_service_account_key(source: impl Into<ServiceAccountKeySource>, url: &str) -> Result<Self, AuthError> {
        let key = match source.into() {
            ServiceAccountKeySource::Parsed(key) => key,
            ServiceAccountKeySource::Path(path) => read_service_account_key(&path)?,
        };
        let provider = ServiceAccountTokenProvider::new(&key)?;
        let auth = Self::with_token_provider(url, provider, Some(key))?;
        auth.current_bearer_header()?;
        Ok(auth)
    }

    /// OAuth context backed by any token provider. Tokens are fetched lazily.
    pub fn with_token_provider(
        url: &str,
        provider: impl TokenProvider + 'static,
        service_key: Option<ServiceAccountKey>,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            url: normalize_url(url)?,
            credentials: Credentials::Bearer(OAuthCredential::new(provider)),
            service_key,
        })
    }

    /// Basic-auth context from a JSON secrets file with `url`, `username`, `password`.
    pub fn from_secrets_file(path: &Path) -> Result<Self, AuthError> {
        let path = expand_tilde(&path.to_string_lossy());
        let secrets_error = |reason: String| AuthError::SecretsFile {
            path: path.clone(),
            reason,
        };
        let data = fs::read_to_string(&path).map_err(|error| secrets_error(error.to_string()))?;
        let secrets: SecretsFile = serde_json::from_str(&data).map_err(|error| secrets_error(error.to_string()))?;
        Self::from_user_password(&secrets.username, &secrets.password, &secrets.url)
    }

    pub fn from_user_password(username: &str, password: &str, url: &str) -> Result<Self, AuthError> {
        Ok(Self {
            url: normalize_url(url)?,
            credentials: Credentials::Basic {
                username: username.to_string(),
                password: password.to_string(),
            },
            service_key: None,
        })
    }

    /// A context with no credentials at all.
    pub fn from_no_authentication(url: &str) -> Result<Self, AuthError> {
        let url = normalize_url(url)?;
        warn!(
            %url,
            "You are not using any authentication with Cromwell. For security purposes, \
             please consider adding authentication in front of your Cromwell instance!"
        );
        Ok(Self {
            url,
            credentials: Credentials::Anonymous,
            service_key: None,
        })
    }

    /// Base URL without a trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn shape(&self) -> CredentialShape {
        match self.credentials {
            Credentials::Basic { .. } => CredentialShape::UserPassword,
            Credentials::Bearer(_) => CredentialShape::ServiceAccount,
            Credentials::Anonymous => CredentialShape::Anonymous,
        }
    }

    pub fn basic_credentials(&self) -> Option<(&str, &str)> {
        match &self.credentials {
            Credentials::Basic { username, password } => Some((username, password)),
            _ => None,
        }
    }

    /// The `Authorization` header value for bearer contexts, refreshing the token if it expired.
    pub fn current_bearer_header(&self) -> Result<Option<String>, AuthError> {
        match &self.credentials {
            Credentials::Bearer(credential) => credential.bearer_header().map(Some),
            _ => Ok(None),
        }
    }

    /// The service-account key, present only for contexts built from one.
    pub fn service_key_content(&self) -> Option<&ServiceAccountKey> {
        self.service_key.as_ref()
    }
}

impl fmt::Debug for CromwellAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CromwellAuth")
            .field("url", &self.url)
            .field("shape", &self.shape())
            .field("username", &self.basic_credentials().map(|(username, _)| username))
            .field("service_account", &self.service_key.as_ref().map(|key| &key.client_email))
            .finish()
    }
}

fn read_service_account_key(path: &Path) -> Result<ServiceAccountKey, AuthError> {
    let path = expand_tilde(&path.to_string_lossy());
    let data = fs::read_to_string(&path).map_err(|error| AuthError::ServiceAccountKey {
        reason: format!("cannot read {}: {error}", path.display()),
    })?;
    serde_json::from_str(&data).map_err(|error| AuthError::ServiceAccountKey {
        reason: format!("{} is not a service account key: {error}", path.display()),
    })
}

fn normalize_url(url: &str) -> Result<String, AuthError> {
    let trimmed = url.trim();
    if !trimmed.starts_with("http") {
        return Err(AuthError::InvalidUrl { url: url.to_string() });
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}
