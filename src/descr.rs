//! Non-model resource descriptions and the root [`ResourceDescr`].
//!
//! Each wrapper embeds a generic base record by value, so the v0.2 and v0.3
//! variants of a type share their wrapper and differ only in the base.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::{BaseFields, GenericBaseV0_2, GenericBaseV0_3};
use crate::fields::{FileSource, HttpUrl};
use crate::model::{ModelDescr, ModelDescrV0_4, ModelDescrV0_5};
use crate::types::{FormatVersion, ResourceType, SchemaVersion};

/// A resource without type-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generic<B> {
    #[serde(flatten)]
    pub base: B,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset<B> {
    #[serde(flatten)]
    pub base: B,
    /// Where the data can be downloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<HttpUrl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook<B> {
    #[serde(flatten)]
    pub base: B,
    /// Packaged. The `.ipynb` notebook.
    pub source: FileSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application<B> {
    #[serde(flatten)]
    pub base: B,
    /// Packaged. The application's entry point or archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<FileSource>,
}

pub type GenericDescrV0_2 = Generic<GenericBaseV0_2>;
pub type GenericDescrV0_3 = Generic<GenericBaseV0_3>;
pub type DatasetDescrV0_2 = Dataset<GenericBaseV0_2>;
pub type DatasetDescrV0_3 = Dataset<GenericBaseV0_3>;
pub type NotebookDescrV0_2 = Notebook<GenericBaseV0_2>;
pub type NotebookDescrV0_3 = Notebook<GenericBaseV0_3>;
pub type ApplicationDescrV0_2 = Application<GenericBaseV0_2>;
pub type ApplicationDescrV0_3 = Application<GenericBaseV0_3>;

/// v0.2 collection entry: an RDF by source, plus fields that override it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntryV0_2 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdf_source: Option<FileSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub overrides: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntryV0_3 {
    /// Packaged. The entry's RDF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_source: Option<FileSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub overrides: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDescrV0_2 {
    #[serde(flatten)]
    pub base: GenericBaseV0_2,
    pub collection: Vec<CollectionEntryV0_2>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDescrV0_3 {
    #[serde(flatten)]
    pub base: GenericBaseV0_3,
    pub collection: Vec<CollectionEntryV0_3>,
}

macro_rules! versioned {
    ($(#[$meta:meta])* $name:ident { $v2:ident($t2:ty), $v3:ident($t3:ty) }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(untagged)]
        pub enum $name {
            $v2($t2),
            $v3($t3),
        }
    };
}

versioned!(
    /// A generic description of any supported format version.
    GenericDescr { V0_2(GenericDescrV0_2), V0_3(GenericDescrV0_3) }
);
versioned!(DatasetDescr { V0_2(DatasetDescrV0_2), V0_3(DatasetDescrV0_3) });
versioned!(NotebookDescr { V0_2(NotebookDescrV0_2), V0_3(NotebookDescrV0_3) });
versioned!(ApplicationDescr { V0_2(ApplicationDescrV0_2), V0_3(ApplicationDescrV0_3) });
versioned!(CollectionDescr { V0_2(CollectionDescrV0_2), V0_3(CollectionDescrV0_3) });

/// A validated resource description.
///
/// Serializes to the same flat mapping it was parsed from. To parse, use
/// [`crate::build_description`], which selects the variant from `type` and
/// `format_version`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceDescr {
    Generic(GenericDescr),
    Dataset(DatasetDescr),
    Notebook(NotebookDescr),
    Application(ApplicationDescr),
    Collection(CollectionDescr),
    Model(ModelDescr),
}

impl ResourceDescr {
    /// The embedded generic base fields.
    pub fn base(&self) -> &dyn BaseFields {
        match self {
            ResourceDescr::Generic(GenericDescr::V0_2(d)) => &d.base,
            ResourceDescr::Generic(GenericDescr::V0_3(d)) => &d.base,
            ResourceDescr::Dataset(DatasetDescr::V0_2(d)) => &d.base,
            ResourceDescr::Dataset(DatasetDescr::V0_3(d)) => &d.base,
            ResourceDescr::Notebook(NotebookDescr::V0_2(d)) => &d.base,
            ResourceDescr::Notebook(NotebookDescr::V0_3(d)) => &d.base,
            ResourceDescr::Application(ApplicationDescr::V0_2(d)) => &d.base,
            ResourceDescr::Application(ApplicationDescr::V0_3(d)) => &d.base,
            ResourceDescr::Collection(CollectionDescr::V0_2(d)) => &d.base,
            ResourceDescr::Collection(CollectionDescr::V0_3(d)) => &d.base,
            ResourceDescr::Model(ModelDescr::V0_4(d)) => &d.base,
            ResourceDescr::Model(ModelDescr::V0_5(d)) => &d.base,
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        self.base().resource_type()
    }

    pub fn format_version(&self) -> FormatVersion {
        self.base().format_version()
    }

    /// The schema family this description was validated against.
    pub fn schema_version(&self) -> SchemaVersion {
        match self {
            ResourceDescr::Generic(GenericDescr::V0_2(_))
            | ResourceDescr::Dataset(DatasetDescr::V0_2(_))
            | ResourceDescr::Notebook(NotebookDescr::V0_2(_))
            | ResourceDescr::Application(ApplicationDescr::V0_2(_))
            | ResourceDescr::Collection(CollectionDescr::V0_2(_)) => SchemaVersion::V0_2,
            ResourceDescr::Generic(GenericDescr::V0_3(_))
            | ResourceDescr::Dataset(DatasetDescr::V0_3(_))
            | ResourceDescr::Notebook(NotebookDescr::V0_3(_))
            | ResourceDescr::Application(ApplicationDescr::V0_3(_))
            | ResourceDescr::Collection(CollectionDescr::V0_3(_)) => SchemaVersion::V0_3,
            ResourceDescr::Model(ModelDescr::V0_4(_)) => SchemaVersion::V0_4,
            ResourceDescr::Model(ModelDescr::V0_5(_)) => SchemaVersion::V0_5,
        }
    }

    pub fn as_model_v0_5(&self) -> Option<&ModelDescrV0_5> {
        match self {
            ResourceDescr::Model(ModelDescr::V0_5(model)) => Some(model.as_ref()),
            _ => None,
        }
    }

    pub fn as_model_v0_4(&self) -> Option<&ModelDescrV0_4> {
        match self {
            ResourceDescr::Model(ModelDescr::V0_4(model)) => Some(model.as_ref()),
            _ => None,
        }
    }
}
