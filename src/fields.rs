//! Field-level value types: identifiers, checksums, versions, licenses,
//! file sources and units.
//!
//! Each type mirrors a constraint that is also published in the JSON Schema
//! (see [`crate::json_schema`]). The constants here are the single source for
//! both representations.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Pattern shared by tensor and axis identifiers.
pub const IDENTIFIER_PATTERN: &str = "^[a-z_][a-z0-9_]*$";
pub const TENSOR_ID_MAX_LEN: usize = 32;
pub const AXIS_ID_MAX_LEN: usize = 16;

pub const SHA256_PATTERN: &str = "^[0-9a-fA-F]{64}$";
pub const VERSION_PATTERN: &str = r"^[0-9]+(\.[0-9]+)*([a-zA-Z0-9.+\-]*)$";
pub const ORCID_PATTERN: &str = r"^[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[0-9X]$";
pub const DOI_PATTERN: &str = r"^10\.[0-9]{4}.+$";
pub const HTTP_URL_PATTERN: &str = "^https?://";

pub const DOCUMENTATION_SUFFIXES: &[&str] = &[".md"];
pub const TEST_TENSOR_SUFFIXES: &[&str] = &[".npy"];
pub const COVER_SUFFIXES: &[&str] = &[".gif", ".jpeg", ".jpg", ".png", ".svg"];
pub const SAMPLE_TENSOR_SUFFIXES: &[&str] = &[
    ".gif", ".jpeg", ".jpg", ".png", ".svg", ".tif", ".tiff", ".npy",
];
pub const NOTEBOOK_SUFFIXES: &[&str] = &[".ipynb"];
pub const ENVIRONMENT_SUFFIXES: &[&str] = &[".yaml", ".yml"];
pub const ARCHITECTURE_SUFFIXES: &[&str] = &[".py"];

pub const SPACE_UNITS: &[&str] = &[
    "attometer",
    "angstrom",
    "centimeter",
    "decimeter",
    "exameter",
    "femtometer",
    "foot",
    "gigameter",
    "hectometer",
    "inch",
    "kilometer",
    "megameter",
    "meter",
    "micrometer",
    "mile",
    "millimeter",
    "nanometer",
    "parsec",
    "petameter",
    "picometer",
    "terameter",
    "yard",
    "yoctometer",
    "yottameter",
    "zeptometer",
    "zettameter",
];

pub const TIME_UNITS: &[&str] = &[
    "attosecond",
    "centisecond",
    "day",
    "decisecond",
    "exasecond",
    "femtosecond",
    "gigasecond",
    "hectosecond",
    "hour",
    "kilosecond",
    "megasecond",
    "microsecond",
    "millisecond",
    "minute",
    "nanosecond",
    "petasecond",
    "picosecond",
    "second",
    "terasecond",
    "yoctosecond",
    "yottasecond",
    "zeptosecond",
    "zettasecond",
];

/// SPDX license identifiers accepted without a note.
pub const LICENSE_IDS: &[&str] = &[
    "0BSD",
    "AFL-3.0",
    "AGPL-3.0-only",
    "AGPL-3.0-or-later",
    "Apache-1.1",
    "Apache-2.0",
    "APSL-2.0",
    "Artistic-2.0",
    "BlueOak-1.0.0",
    "BSD-1-Clause",
    "BSD-2-Clause",
    "BSD-2-Clause-Patent",
    "BSD-3-Clause",
    "BSD-3-Clause-Clear",
    "BSD-4-Clause",
    "BSL-1.0",
    "CAL-1.0",
    "CC-BY-1.0",
    "CC-BY-2.0",
    "CC-BY-2.5",
    "CC-BY-3.0",
    "CC-BY-4.0",
    "CC-BY-NC-2.0",
    "CC-BY-NC-3.0",
    "CC-BY-NC-4.0",
    "CC-BY-NC-ND-4.0",
    "CC-BY-NC-SA-4.0",
    "CC-BY-ND-4.0",
    "CC-BY-SA-3.0",
    "CC-BY-SA-4.0",
    "CC0-1.0",
    "CDDL-1.0",
    "CECILL-2.1",
    "ECL-2.0",
    "EPL-1.0",
    "EPL-2.0",
    "EUPL-1.1",
    "EUPL-1.2",
    "GPL-1.0-only",
    "GPL-1.0-or-later",
    "GPL-2.0-only",
    "GPL-2.0-or-later",
    "GPL-3.0-only",
    "GPL-3.0-or-later",
    "ISC",
    "LGPL-2.0-only",
    "LGPL-2.0-or-later",
    "LGPL-2.1-only",
    "LGPL-2.1-or-later",
    "LGPL-3.0-only",
    "LGPL-3.0-or-later",
    "LPPL-1.3c",
    "MIT",
    "MIT-0",
    "MPL-1.1",
    "MPL-2.0",
    "MS-PL",
    "MS-RL",
    "MulanPSL-2.0",
    "NCSA",
    "ODbL-1.0",
    "OFL-1.1",
    "OSL-3.0",
    "PDDL-1.0",
    "PostgreSQL",
    "Python-2.0",
    "Unlicense",
    "UPL-1.0",
    "Vim",
    "W3C",
    "WTFPL",
    "X11",
    "Zlib",
    "ZPL-2.1",
];

/// SPDX identifiers that are deprecated but still accepted with a note.
pub const DEPRECATED_LICENSE_IDS: &[&str] = &[
    "AGPL-1.0",
    "AGPL-3.0",
    "BSD-2-Clause-FreeBSD",
    "BSD-2-Clause-NetBSD",
    "bzip2-1.0.5",
    "eCos-2.0",
    "GFDL-1.1",
    "GFDL-1.2",
    "GFDL-1.3",
    "GPL-1.0",
    "GPL-1.0+",
    "GPL-2.0",
    "GPL-2.0+",
    "GPL-2.0-with-autoconf-exception",
    "GPL-2.0-with-classpath-exception",
    "GPL-3.0",
    "GPL-3.0+",
    "LGPL-2.0",
    "LGPL-2.0+",
    "LGPL-2.1",
    "LGPL-2.1+",
    "LGPL-3.0",
    "LGPL-3.0+",
    "Nunit",
    "StandardML-NJ",
    "wxWindows",
];

/// Errors raised when a raw string cannot become a field value.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldValueError {
    #[error("identifier must not be empty")]
    EmptyIdentifier,
    #[error("identifier \"{value}\" is longer than {max} characters")]
    IdentifierTooLong { value: String, max: usize },
    #[error("identifier \"{value}\" may only contain a-z, 0-9 and _ and must not start with a digit")]
    IdentifierCharacters { value: String },
    #[error("sha256 \"{0}\" must be 64 hexadecimal characters")]
    Sha256(String),
    #[error("\"{0}\" is not a valid version")]
    Version(String),
    #[error("file source must not be empty")]
    EmptyFileSource,
    #[error("unknown unit \"{0}\"")]
    Unit(String),
}

fn check_identifier(value: &str, max: usize) -> Result<(), FieldValueError> {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err(FieldValueError::EmptyIdentifier);
    };
    if value.chars().count() > max {
        return Err(FieldValueError::IdentifierTooLong {
            value: value.to_string(),
            max,
        });
    }
    let valid_first = first.is_ascii_lowercase() || first == '_';
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid_first || !valid_rest {
        return Err(FieldValueError::IdentifierCharacters {
            value: value.to_string(),
        });
    }
    Ok(())
}

macro_rules! lower_case_identifier {
    ($(#[$meta:meta])* $name:ident, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, FieldValueError> {
                Self::try_from(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// For literal defaults that are known to be valid.
            pub(crate) fn from_static(value: &'static str) -> Self {
                Self(value.to_string())
            }
        }

        impl TryFrom<String> for $name {
            type Error = FieldValueError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                check_identifier(&value, $max)?;
                Ok(Self(value))
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }
    };
}

lower_case_identifier!(
    /// Identifier of a tensor, unique across a model's inputs and outputs.
    TensorId,
    TENSOR_ID_MAX_LEN
);

lower_case_identifier!(
    /// Identifier of an axis, unique within its tensor.
    AxisId,
    AXIS_ID_MAX_LEN
);

/// A SHA256 checksum as 64 hexadecimal characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256(String);

impl Sha256 {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a computed hex digest, ignoring case.
    pub fn matches_hex(&self, hex: &str) -> bool {
        self.0.eq_ignore_ascii_case(hex)
    }
}

impl TryFrom<String> for Sha256 {
    type Error = FieldValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(value))
        } else {
            Err(FieldValueError::Sha256(value))
        }
    }
}

impl From<Sha256> for String {
    fn from(value: Sha256) -> Self {
        value.0
    }
}

impl fmt::Display for Sha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Version of a resource or library, e.g. `1`, `0.2.3`, `1.10.0rc1`.
///
/// YAML authors often write versions as bare numbers, so numbers are
/// accepted and stored in their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawVersion", into = "String")]
pub struct Version(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Text(String),
    Integer(u64),
    Float(f64),
}

impl Version {
    pub fn parse(value: &str) -> Result<Self, FieldValueError> {
        let release_end = value
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(value.len());
        let (release, rest) = value.split_at(release_end);
        let release = release.trim_end_matches('.');
        let release_ok = !release.is_empty()
            && release
                .split('.')
                .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()));
        let rest_ok = rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'));
        if release_ok && rest_ok {
            Ok(Self(value.to_string()))
        } else {
            Err(FieldValueError::Version(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<RawVersion> for Version {
    type Error = FieldValueError;

    fn try_from(value: RawVersion) -> Result<Self, Self::Error> {
        match value {
            RawVersion::Text(s) => Version::parse(&s),
            RawVersion::Integer(n) => Version::parse(&n.to_string()),
            RawVersion::Float(x) => Version::parse(&x.to_string()),
        }
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a license id is current, deprecated or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseStatus {
    Current,
    Deprecated,
    Unknown,
}

/// An SPDX license identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseId(String);

impl LicenseId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn status(&self) -> LicenseStatus {
        if LICENSE_IDS.contains(&self.0.as_str()) {
            LicenseStatus::Current
        } else if DEPRECATED_LICENSE_IDS.contains(&self.0.as_str()) {
            LicenseStatus::Deprecated
        } else {
            LicenseStatus::Unknown
        }
    }
}

impl fmt::Display for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ORCID iD, e.g. `0000-0002-1825-0097`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Orcid(String);

impl Orcid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate the ISO 7064 11,2 check digit.
    pub fn checksum_valid(&self) -> bool {
        let digits: Vec<char> = self.0.chars().filter(|c| *c != '-').collect();
        if digits.len() != 16 {
            return false;
        }
        let mut total: u32 = 0;
        for c in &digits[..15] {
            let Some(d) = c.to_digit(10) else {
                return false;
            };
            total = (total + d) * 2;
        }
        let result = (12 - total % 11) % 11;
        let expected = if result == 10 {
            'X'
        } else {
            char::from_digit(result, 10).unwrap_or('?')
        };
        digits[15] == expected
    }
}

/// An HTTP(S) URL kept in its textual form; parsed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HttpUrl(String);

impl HttpUrl {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse(&self) -> Result<url::Url, url::ParseError> {
        url::Url::parse(&self.0)
    }
}

/// Where a file lives: an HTTP(S) URL, an absolute path or a path relative
/// to the description's root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FileSource {
    Http(String),
    AbsolutePath(PathBuf),
    RelativePath(String),
}

impl FileSource {
    pub fn new(value: impl Into<String>) -> Result<Self, FieldValueError> {
        Self::try_from(value.into())
    }

    pub fn is_url(&self) -> bool {
        matches!(self, FileSource::Http(_))
    }

    pub fn as_string(&self) -> String {
        match self {
            FileSource::Http(url) => url.clone(),
            FileSource::AbsolutePath(path) => path.to_string_lossy().into_owned(),
            FileSource::RelativePath(path) => path.clone(),
        }
    }

    /// Parse the URL of an `Http` source.
    pub fn url(&self) -> Option<Result<url::Url, url::ParseError>> {
        match self {
            FileSource::Http(url) => Some(url::Url::parse(url)),
            _ => None,
        }
    }

    /// The path component used for suffix checks and file names.
    fn path_part(&self) -> String {
        match self {
            FileSource::Http(raw) => match url::Url::parse(raw) {
                Ok(url) => url.path().to_string(),
                Err(_) => raw
                    .split(['?', '#'])
                    .next()
                    .unwrap_or(raw.as_str())
                    .to_string(),
            },
            FileSource::AbsolutePath(path) => path.to_string_lossy().into_owned(),
            FileSource::RelativePath(path) => path.clone(),
        }
    }

    /// The final path segment, if any.
    pub fn file_name(&self) -> Option<String> {
        let path = self.path_part();
        path.rsplit(['/', '\\'])
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    /// Whether the source ends in one of `suffixes` (case-insensitive).
    pub fn has_suffix(&self, suffixes: &[&str]) -> bool {
        let path = self.path_part().to_lowercase();
        suffixes.iter().any(|suffix| path.ends_with(suffix))
    }

    /// Resolve a local source against `root`. URLs have no local path.
    pub fn local_path(&self, root: &Path) -> Option<PathBuf> {
        match self {
            FileSource::Http(_) => None,
            FileSource::AbsolutePath(path) => Some(path.clone()),
            FileSource::RelativePath(path) => Some(root.join(path)),
        }
    }
}

impl TryFrom<String> for FileSource {
    type Error = FieldValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(FieldValueError::EmptyFileSource);
        }
        if value.starts_with("http://") || value.starts_with("https://") {
            return Ok(FileSource::Http(value));
        }
        let path = Path::new(&value);
        if path.is_absolute() || value.starts_with('/') {
            return Ok(FileSource::AbsolutePath(PathBuf::from(value)));
        }
        Ok(FileSource::RelativePath(value))
    }
}

impl From<FileSource> for String {
    fn from(value: FileSource) -> Self {
        value.as_string()
    }
}

impl fmt::Display for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// An icon: either a one- or two-character emoji or an image file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Icon {
    Emoji(String),
    File(FileSource),
}

impl TryFrom<String> for Icon {
    type Error = FieldValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if (1..=2).contains(&value.chars().count()) {
            Ok(Icon::Emoji(value))
        } else {
            FileSource::try_from(value).map(Icon::File)
        }
    }
}

impl From<Icon> for String {
    fn from(value: Icon) -> Self {
        match value {
            Icon::Emoji(emoji) => emoji,
            Icon::File(source) => source.into(),
        }
    }
}

macro_rules! unit {
    ($(#[$meta:meta])* $name:ident, $units:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = FieldValueError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                if $units.contains(&value.as_str()) {
                    Ok(Self(value))
                } else {
                    Err(FieldValueError::Unit(value))
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

unit!(
    /// Physical unit of a space axis.
    SpaceUnit,
    SPACE_UNITS
);

unit!(
    /// Physical unit of a time axis.
    TimeUnit,
    TIME_UNITS
);
