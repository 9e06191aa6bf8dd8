//! Value records shared by every resource type, and the two generic base
//! records that version-specific descriptions embed by value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::child_path;
use crate::fields::{FileSource, HttpUrl, Icon, LicenseId, Orcid, Sha256, Version};
use crate::types::{FormatVersion, ResourceType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<Orcid>,
}

/// Maintainers are identified by their GitHub user; the name is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    pub github_user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<Orcid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uploader {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A citation. At least one of `doi` and `url` is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiteEntry {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<HttpUrl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub url: HttpUrl,
}

/// A file source with an optional checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescr {
    pub source: FileSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Sha256>,
}

/// Reference to another resource by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedResource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_number: Option<u64>,
}

/// v0.2 attachments: a `files` list plus free-form extra keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentsV0_2 {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileSource>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fields common to every v0.2 description (and model v0.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericBaseV0_2 {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub format_version: FormatVersion,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<AttachmentsV0_2>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badges: Vec<Badge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cite: Vec<CiteEntry>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
    /// Packaged. Cover images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub covers: Vec<FileSource>,
    /// Packaged. Markdown documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<FileSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<HttpUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<HttpUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdf_source: Option<FileSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<Uploader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

/// Fields common to every v0.3 description (and model v0.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericBaseV0_3 {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub format_version: FormatVersion,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,
    /// Packaged. Additional files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<FileDescr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badges: Vec<Badge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cite: Vec<CiteEntry>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
    /// Packaged. Cover images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub covers: Vec<FileSource>,
    /// Packaged. Markdown documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<FileSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<HttpUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<Uploader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

/// Read access to the fields both generic bases share.
pub trait BaseFields {
    fn resource_type(&self) -> ResourceType;
    fn format_version(&self) -> FormatVersion;
    fn name(&self) -> &str;
    fn authors(&self) -> &[Author];
    fn maintainers(&self) -> &[Maintainer];
    fn badges(&self) -> &[Badge];
    fn cite(&self) -> &[CiteEntry];
    fn covers(&self) -> &[FileSource];
    fn documentation(&self) -> Option<&FileSource>;
    fn git_repo(&self) -> Option<&HttpUrl>;
    fn icon(&self) -> Option<&Icon>;
    fn license(&self) -> Option<&LicenseId>;
    /// Attached files with their field paths, in document order.
    fn attachment_files(&self) -> Vec<(String, &FileSource, Option<&Sha256>)>;
}

macro_rules! impl_base_fields {
    ($ty:ty, |$this:ident| $attachments:expr) => {
        impl BaseFields for $ty {
            fn resource_type(&self) -> ResourceType {
                self.resource_type
            }
            fn format_version(&self) -> FormatVersion {
                self.format_version
            }
            fn name(&self) -> &str {
                &self.name
            }
            fn authors(&self) -> &[Author] {
                &self.authors
            }
            fn maintainers(&self) -> &[Maintainer] {
                &self.maintainers
            }
            fn badges(&self) -> &[Badge] {
                &self.badges
            }
            fn cite(&self) -> &[CiteEntry] {
                &self.cite
            }
            fn covers(&self) -> &[FileSource] {
                &self.covers
            }
            fn documentation(&self) -> Option<&FileSource> {
                self.documentation.as_ref()
            }
            fn git_repo(&self) -> Option<&HttpUrl> {
                self.git_repo.as_ref()
            }
            fn icon(&self) -> Option<&Icon> {
                self.icon.as_ref()
            }
            fn license(&self) -> Option<&LicenseId> {
                self.license.as_ref()
            }
            fn attachment_files(&self) -> Vec<(String, &FileSource, Option<&Sha256>)> {
                let $this = self;
                $attachments
            }
        }
    };
}

impl_base_fields!(GenericBaseV0_2, |this| match &this.attachments {
    Some(attachments) => attachments
        .files
        .iter()
        .enumerate()
        .map(|(i, file)| (child_path("attachments.files", i), file, None))
        .collect(),
    None => Vec::new(),
});

impl_base_fields!(GenericBaseV0_3, |this| this
    .attachments
    .iter()
    .enumerate()
    .map(|(i, file)| {
        (
            child_path(&child_path("attachments", i), "source"),
            &file.source,
            file.sha256.as_ref(),
        )
    })
    .collect());

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_v0_2_defaults_missing_lists() {
        let base: GenericBaseV0_2 = serde_json::from_value(json!({
            "type": "dataset",
            "format_version": "0.2.4",
            "name": "Nuclei",
            "description": "Fluorescence nuclei"
        }))
        .unwrap();
        assert!(base.authors.is_empty());
        assert!(base.covers.is_empty());
        assert_eq!(base.resource_type, ResourceType::Dataset);
        assert!(base.attachment_files().is_empty());
    }

    #[test]
    fn base_v0_2_attachments_keep_extra_keys() {
        let base: GenericBaseV0_2 = serde_json::from_value(json!({
            "type": "generic",
            "format_version": "0.2.4",
            "name": "thing",
            "description": "a thing",
            "attachments": {"files": ["a.txt", "b.txt"], "notes": "see docs"}
        }))
        .unwrap();
        let attachments = base.attachments.as_ref().unwrap();
        assert_eq!(attachments.extra["notes"], json!("see docs"));
        let files = base.attachment_files();
        assert_eq!(files[1].0, "attachments.files.1");
    }

    #[test]
    fn base_v0_3_attachment_paths() {
        let base: GenericBaseV0_3 = serde_json::from_value(json!({
            "type": "generic",
            "format_version": "0.3.0",
            "name": "thing",
            "description": "a thing",
            "attachments": [{"source": "a.txt"}, {"source": "https://example.com/b.txt"}]
        }))
        .unwrap();
        let files = base.attachment_files();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].0, "attachments.0.source");
        assert!(files[1].1.is_url());
    }

    #[test]
    fn serialization_skips_empty_fields() {
        let base: GenericBaseV0_3 = serde_json::from_value(json!({
            "type": "generic",
            "format_version": "0.3.0",
            "name": "thing",
            "description": "a thing",
            "tags": []
        }))
        .unwrap();
        let value = serde_json::to_value(&base).unwrap();
        assert!(value.get("tags").is_none());
        assert_eq!(value["type"], "generic");
    }
}
