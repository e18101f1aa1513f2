//! Resolve file-like inputs into in-memory bytes.
//!
//! A reference that starts with `http://` or `https://` is fetched with a GET
//! request; anything else is read from the local filesystem. In-memory
//! buffers pass through untouched.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use cromwell_types::FileSource;
use dirs_next::home_dir;
use indexmap::IndexMap;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::error::LoadError;

/// Prefixes that mark a reference as remote.
pub const REMOTE_PREFIXES: &[&str] = &["http://", "https://"];

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Whether `reference` should be fetched over HTTP rather than read from disk.
pub fn is_remote_reference(reference: &str) -> bool {
    let lowered = reference.trim_start().to_ascii_lowercase();
    REMOTE_PREFIXES.iter().any(|prefix| lowered.starts_with(prefix))
}

/// Resolve a [`FileSource`] to its bytes.
pub fn load(source: &FileSource) -> Result<Vec<u8>, LoadError> {
    match source {
        FileSource::Bytes(content) => Ok(content.clone()),
        FileSource::Reference(reference) => load_reference(reference),
    }
}

/// Resolve a path or URL to its bytes.
pub fn load_reference(reference: &str) -> Result<Vec<u8>, LoadError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(LoadError::invalid_argument("the url/path must be a non-empty string"));
    }
    if is_remote_reference(reference) {
        download_http(reference)
    } else {
        read_local_file(reference)
    }
}

/// Load every reference, keyed by the reference it came from, preserving order.
pub fn load_to_map<I, S>(references: I) -> Result<IndexMap<String, Vec<u8>>, LoadError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut contents = IndexMap::new();
    for reference in references {
        let reference = reference.as_ref();
        contents.insert(reference.to_string(), load_reference(reference)?);
    }
    Ok(contents)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    let home = || home_dir().unwrap_or_else(|| PathBuf::from("~"));
    match trimmed {
        "~" => home(),
        _ => match trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
            Some(rest) => home().join(rest),
            None => PathBuf::from(trimmed),
        },
    }
}

fn download_http(url: &str) -> Result<Vec<u8>, LoadError> {
    debug!(%url, "fetching remote resource");
    let transport_error = |source: reqwest::Error| LoadError::Transport { url: url.to_string(), source };

    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(transport_error)?;
    let response = client.get(url).send().map_err(transport_error)?;
    let status = response.status();
    let textual = is_textual(response.headers().get(CONTENT_TYPE).and_then(|value| value.to_str().ok()));

    if !status.is_success() {
        let body = response.text().map_err(transport_error)?;
        return Err(LoadError::RemoteFetch {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    // Text is decoded with its declared charset and re-encoded as UTF-8; anything else is kept byte for byte.
    if textual && !url.trim_end().to_ascii_lowercase().ends_with(".zip") {
        Ok(response.text().map_err(transport_error)?.into_bytes())
    } else {
        Ok(response.bytes().map_err(transport_error)?.to_vec())
    }
}

/// Whether a `Content-Type` denotes text. Without the header the body is kept as raw bytes.
fn is_textual(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    mime.starts_with("text/") || mime == "application/json" || mime.ends_with("+json")
}

fn read_local_file(reference: &str) -> Result<Vec<u8>, LoadError> {
    let path = expand_tilde(reference);
    if !path.is_file() {
        return Err(LoadError::ResourceNotFound {
            reference: reference.to_string(),
        });
    }
    fs::read(&path).map_err(|source| LoadError::Io { path, source })
}
