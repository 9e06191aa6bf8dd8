//! Document loading from files, strings and HTTP URLs, and serialization
//! of validated descriptions.
//!
//! Documents are YAML or JSON. Both are read into a `serde_json::Value` so
//! that the rest of the pipeline sees one representation.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::descr::ResourceDescr;
use crate::error::{LoadError, ValidateError};
use crate::registry::{build_description, Validated};
use crate::types::{json_type_name, ValidationOptions};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a document from a file path.
///
/// Files ending in `.json` are parsed as JSON, everything else as YAML.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist, a parse
/// error for malformed content, or `LoadError::NotAMapping` if the top
/// level is not a mapping.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        parse_json(&content)
    } else {
        load_document_str(&content)
    }
}

/// Load a document from a YAML string. JSON input is accepted as well.
///
/// # Errors
///
/// Returns `LoadError::InvalidYaml` or `LoadError::NotAMapping`.
pub fn load_document_str(content: &str) -> Result<Value, LoadError> {
    let value: Value =
        serde_yaml::from_str(content).map_err(|source| LoadError::InvalidYaml { source })?;
    ensure_mapping(value)
}

fn parse_json(content: &str) -> Result<Value, LoadError> {
    let value: Value =
        serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })?;
    ensure_mapping(value)
}

fn ensure_mapping(value: Value) -> Result<Value, LoadError> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(LoadError::NotAMapping {
            actual: json_type_name(&value).to_string(),
        })
    }
}

/// Load a document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails, or a parse
/// error if the response is not a valid document.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<Value, LoadError> {
    let network_error = |source: reqwest::Error| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network_error)?;

    tracing::debug!(%url, "fetching document");
    let response = client.get(url).send().map_err(network_error)?;

    // Check for HTTP errors before parsing
    let response = response.error_for_status().map_err(network_error)?;
    let content = response.text().map_err(network_error)?;

    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.to_ascii_lowercase().ends_with(".json") {
        parse_json(&content)
    } else {
        load_document_str(&content)
    }
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a document from a file path or URL.
///
/// URL loading requires the `remote` feature.
///
/// # Errors
///
/// Returns appropriate errors based on the source type.
pub fn load_document_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: PathBuf::from(source),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}

/// The directory relative file sources of a local document resolve against.
///
/// `None` for URLs.
pub fn document_root(source: &str) -> Option<PathBuf> {
    if is_url(source) {
        return None;
    }
    let parent = Path::new(source).parent()?;
    if parent.as_os_str().is_empty() {
        Some(PathBuf::from("."))
    } else {
        Some(parent.to_path_buf())
    }
}

/// Load and validate a description from a file path or URL.
///
/// Unless `options.root` is set, relative file sources resolve against the
/// document's directory.
///
/// # Errors
///
/// Returns `ValidateError::Load` if the document cannot be loaded, or
/// `ValidateError::Invalid` if it does not validate.
pub fn load_description(
    source: &str,
    options: &ValidationOptions,
) -> Result<Validated, ValidateError> {
    let document = load_document_auto(source)?;
    let mut options = options.clone();
    if options.root.is_none() {
        options.root = document_root(source);
    }
    build_description(&document, &options)
}

/// Serialize a description back to YAML.
///
/// # Errors
///
/// Returns the serializer's error; validated descriptions always serialize.
pub fn to_yaml_string(descr: &ResourceDescr) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(descr)
}

/// Serialize a description to a JSON value.
///
/// # Errors
///
/// Returns the serializer's error; validated descriptions always serialize.
pub fn to_json_value(descr: &ResourceDescr) -> Result<Value, serde_json::Error> {
    serde_json::to_value(descr)
}
