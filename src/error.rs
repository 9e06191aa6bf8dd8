//! Error types for loading, validating and packaging resource descriptions.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors while loading a document from a file, string or URL.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("resource description must be a mapping, got {actual}")]
    NotAMapping { actual: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Category of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Wrong or missing `type`/`format_version`, or a value of the wrong shape.
    Structural,
    /// Inconsistency between fields: unresolved references, cycles,
    /// ordering violations, duplicate identifiers.
    CrossField,
    /// Non-fatal note, reported as a warning.
    Note,
}

/// Single validation issue with field path context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Dotted path to the offending field (e.g. `inputs.0.axes.2.size.tensor_id`).
    /// Empty for the document root.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
    pub kind: IssueKind,
}

impl FieldError {
    pub fn structural(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind: IssueKind::Structural,
        }
    }

    pub fn cross_field(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind: IssueKind::CrossField,
        }
    }

    pub fn note(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind: IssueKind::Note,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Errors during validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid {
        errors: Vec<FieldError>,
        warnings: Vec<FieldError>,
    },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Load(e) => e.exit_code(),
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Errors while planning a package of a validated description.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("archive name \"{name}\" is used by both {first} and {second}")]
    DuplicateArchiveName {
        name: String,
        first: String,
        second: String,
    },

    #[error("cannot derive an archive file name for {path}: {source_str}")]
    NoFileName { path: String, source_str: String },

    #[error("failed to serialize description: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

/// Append a segment to a dotted field path.
pub(crate) fn child_path(path: &str, segment: impl fmt::Display) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

/// Convert a JSON Pointer (RFC 6901) into a dotted field path.
///
/// `/inputs/0/axes` becomes `inputs.0.axes`; the empty pointer is the root.
pub fn field_path_from_pointer(pointer: &str) -> String {
    pointer
        .split('/')
        .skip(1)
        .map(|part| part.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}
