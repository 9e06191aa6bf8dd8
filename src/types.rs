//! Core types for resource description selection and validation.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource types a description may declare in its `type` field.
pub const RESOURCE_TYPES: &[&str] = &[
    "application",
    "collection",
    "dataset",
    "generic",
    "model",
    "notebook",
];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The `type` tag of a resource description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Application,
    Collection,
    Dataset,
    Generic,
    Model,
    Notebook,
}

impl ResourceType {
    /// Parse a resource type from its tag.
    ///
    /// Returns `None` for unknown tags (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "application" => Some(ResourceType::Application),
            "collection" => Some(ResourceType::Collection),
            "dataset" => Some(ResourceType::Dataset),
            "generic" => Some(ResourceType::Generic),
            "model" => Some(ResourceType::Model),
            "notebook" => Some(ResourceType::Notebook),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Application => "application",
            ResourceType::Collection => "collection",
            ResourceType::Dataset => "dataset",
            ResourceType::Generic => "generic",
            ResourceType::Model => "model",
            ResourceType::Notebook => "notebook",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `format_version` value: `MAJOR.MINOR.PATCH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FormatVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a strict `MAJOR.MINOR.PATCH` version.
    ///
    /// Returns `None` if the string is not exactly three dot-separated
    /// unsigned integers.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let major = parse_component(parts.next()?)?;
        let minor = parse_component(parts.next()?)?;
        let patch = parse_component(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }

    /// The schema family (`MAJOR.MINOR`) this version belongs to.
    pub fn family(&self) -> (u32, u32) {
        (self.major, self.minor)
    }
}

fn parse_component(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for FormatVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FormatVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FormatVersion::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid format_version \"{raw}\": expected MAJOR.MINOR.PATCH"
            ))
        })
    }
}

/// A schema family: the `MAJOR.MINOR` part that selects a concrete schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaVersion {
    V0_2,
    V0_3,
    V0_4,
    V0_5,
}

impl SchemaVersion {
    pub fn family(&self) -> (u32, u32) {
        match self {
            SchemaVersion::V0_2 => (0, 2),
            SchemaVersion::V0_3 => (0, 3),
            SchemaVersion::V0_4 => (0, 4),
            SchemaVersion::V0_5 => (0, 5),
        }
    }

    /// Parse a family from `MAJOR.MINOR` or a full `MAJOR.MINOR.PATCH`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let major = parse_component(parts.next()?)?;
        let minor = parse_component(parts.next()?)?;
        if let Some(patch) = parts.next() {
            parse_component(patch)?;
        }
        if parts.next().is_some() {
            return None;
        }
        match (major, minor) {
            (0, 2) => Some(SchemaVersion::V0_2),
            (0, 3) => Some(SchemaVersion::V0_3),
            (0, 4) => Some(SchemaVersion::V0_4),
            (0, 5) => Some(SchemaVersion::V0_5),
            _ => None,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor) = self.family();
        write!(f, "{major}.{minor}")
    }
}

/// Options for validating a resource description.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Check that packaged local files exist and match their `sha256`.
    /// Off by default: validation never requires file-system presence.
    pub verify_files: bool,
    /// Also check that URL file sources are reachable.
    /// Only has an effect together with `verify_files` and the `remote` feature.
    pub check_urls: bool,
    /// Directory that relative file sources are resolved against.
    /// Defaults to the current directory when verifying files.
    pub root: Option<PathBuf>,
    /// Treat warnings as errors.
    pub strict: bool,
}

impl ValidationOptions {
    /// Create options that validate without touching the file system or network.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verify_files(mut self, verify_files: bool) -> Self {
        self.verify_files = verify_files;
        self
    }

    pub fn check_urls(mut self, check_urls: bool) -> Self {
        self.check_urls = check_urls;
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
