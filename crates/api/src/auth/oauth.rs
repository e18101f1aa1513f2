//! OAuth2 bearer tokens minted from a service-account key.
//!
//! A [`TokenProvider`] produces fresh tokens; [`OAuthCredential`] caches the
//! latest one and only asks the provider again when the cached token is
//! missing or about to expire.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use cromwell_types::ServiceAccountKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;

/// Identity scopes requested for Cromwell access.
pub const DEFAULT_SCOPES: &[&str] = &["email", "openid", "profile"];

pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens expiring within this window are treated as already expired.
pub const REFRESH_SKEW: TimeDelta = TimeDelta::seconds(60);

const ASSERTION_LIFETIME: TimeDelta = TimeDelta::seconds(3600);
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now + REFRESH_SKEW < self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of new access tokens.
pub trait TokenProvider: Send + Sync {
    fn fetch_token(&self) -> Result<AccessToken, AuthError>;
}

/// A token cache in front of a [`TokenProvider`].
pub struct OAuthCredential {
    provider: Box<dyn TokenProvider>,
    cached: Mutex<Option<AccessToken>>,
}

impl OAuthCredential {
    pub fn new(provider: impl TokenProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            cached: Mutex::new(None),
        }
    }

    /// `Bearer <token>`, refreshing through the provider first if needed.
    pub fn bearer_header(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = cached.as_ref()
            && token.is_fresh_at(Utc::now())
        {
            return Ok(format!("Bearer {}", token.value));
        }

        debug!("access token missing or expiring; requesting a new one");
        let token = self.provider.fetch_token()?;
        let header = format!("Bearer {}", token.value);
        *cached = Some(token);
        Ok(header)
    }
}

impl fmt::Debug for OAuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("OAuthCredential").field("cached", &*cached).finish_non_exhaustive()
    }
}

/// Exchanges a signed JWT assertion for an access token at the key's `token_uri`.
pub struct ServiceAccountTokenProvider {
    client_email: String,
    private_key_id: Option<String>,
    token_uri: String,
    scopes: String,
    signing_key: EncodingKey,
    http: Client,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME.num_seconds()
}

impl ServiceAccountTokenProvider {
    pub fn new(key: &ServiceAccountKey) -> Result<Self, AuthError> {
        Self::with_scopes(key, DEFAULT_SCOPES)
    }

    pub fn with_scopes(key: &ServiceAccountKey, scopes: &[&str]) -> Result<Self, AuthError> {
        let signing_key =
            EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|error| AuthError::ServiceAccountKey {
                reason: format!("private_key is not a usable RSA key: {error}"),
            })?;
        let http = Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .build()
            .map_err(|error| AuthError::TokenRequest {
                token_uri: key.token_uri.clone(),
                reason: error.to_string(),
            })?;

        Ok(Self {
            client_email: key.client_email.clone(),
            private_key_id: key.private_key_id.clone(),
            token_uri: key.token_uri.clone(),
            scopes: scopes.join(" "),
            signing_key,
            http,
        })
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        let issued_at = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: &self.scopes,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME.num_seconds(),
        };
        Ok(encode(&header, &claims, &self.signing_key)?)
    }

    fn request_error(&self, reason: impl fmt::Display) -> AuthError {
        AuthError::TokenRequest {
            token_uri: self.token_uri.clone(),
            reason: reason.to_string(),
        }
    }
}

impl TokenProvider for ServiceAccountTokenProvider {
    fn fetch_token(&self) -> Result<AccessToken, AuthError> {
        let now = Utc::now();
        let assertion = self.signed_assertion(now)?;
        debug!(token_uri = %self.token_uri, client_email = %self.client_email, "exchanging service account assertion");

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .map_err(|error| self.request_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(self.request_error(format!("HTTP {}: {}", status.as_u16(), cromwell_util::redact_sensitive(&body))));
        }

        let token: TokenResponse = response.json().map_err(|error| self.request_error(error))?;
        Ok(AccessToken {
            value: token.access_token,
            expires_at: now + TimeDelta::seconds(token.expires_in),
        })
    }
}

impl fmt::Debug for ServiceAccountTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenProvider")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
