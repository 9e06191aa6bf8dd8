//! Model weights in one or more serialization formats.
//!
//! Each format has at most one entry. An entry may name the entry it was
//! converted from as its `parent`; together the entries form a derivation
//! tree that [`crate::resolver`] checks.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::{Author, FileDescr};
use crate::fields::{FileSource, Sha256, Version};

/// The weight formats, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightsFormat {
    KerasHdf5,
    Onnx,
    PytorchStateDict,
    TensorflowJs,
    TensorflowSavedModelBundle,
    Torchscript,
}

impl WeightsFormat {
    pub const ALL: &'static [WeightsFormat] = &[
        WeightsFormat::KerasHdf5,
        WeightsFormat::Onnx,
        WeightsFormat::PytorchStateDict,
        WeightsFormat::TensorflowJs,
        WeightsFormat::TensorflowSavedModelBundle,
        WeightsFormat::Torchscript,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WeightsFormat::KerasHdf5 => "keras_hdf5",
            WeightsFormat::Onnx => "onnx",
            WeightsFormat::PytorchStateDict => "pytorch_state_dict",
            WeightsFormat::TensorflowJs => "tensorflow_js",
            WeightsFormat::TensorflowSavedModelBundle => "tensorflow_saved_model_bundle",
            WeightsFormat::Torchscript => "torchscript",
        }
    }
}

impl fmt::Display for WeightsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every weights entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsEntryBase {
    /// Packaged. The weights file.
    pub source: FileSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Sha256>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    /// The format these weights were converted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<WeightsFormat>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

/// A v0.4 dependency string such as `conda:environment.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyDependencies(String);

impl LegacyDependencies {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into package manager and file, e.g. `("conda", "env.yaml")`.
    pub fn split(&self) -> Option<(&str, &str)> {
        let (manager, file) = self.0.split_once(':')?;
        matches!(manager, "conda" | "maven" | "pip")
            .then_some((manager, file))
            .filter(|(_, file)| !file.is_empty())
    }
}

/// A v0.4 architecture: `path/to/module.py:ClassName` or an importable
/// dotted name such as `my_pkg.models.UNet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyArchitecture(String);

impl LegacyArchitecture {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `(file, callable)` when the architecture is defined in a source file.
    pub fn from_file(&self) -> Option<(&str, &str)> {
        let (file, callable) = self.0.rsplit_once(':')?;
        if file.is_empty() || callable.is_empty() {
            return None;
        }
        Some((file, callable))
    }
}

macro_rules! weights_entry {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $field:ident : $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(flatten)]
            pub base: WeightsEntryBase,
            $($(#[$fmeta])* pub $field: $ty,)*
        }
    };
}

weights_entry!(KerasHdf5WeightsV0_4 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tensorflow_version: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dependencies: Option<LegacyDependencies>,
});

weights_entry!(OnnxWeightsV0_4 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    opset_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dependencies: Option<LegacyDependencies>,
});

weights_entry!(PytorchStateDictWeightsV0_4 {
    architecture: LegacyArchitecture,
    /// Checksum of the architecture source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    architecture_sha256: Option<Sha256>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    kwargs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pytorch_version: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dependencies: Option<LegacyDependencies>,
});

weights_entry!(TensorflowJsWeightsV0_4 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tensorflow_version: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dependencies: Option<LegacyDependencies>,
});

weights_entry!(TensorflowSavedModelBundleWeightsV0_4 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tensorflow_version: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dependencies: Option<LegacyDependencies>,
});

weights_entry!(TorchscriptWeightsV0_4 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pytorch_version: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dependencies: Option<LegacyDependencies>,
});

/// Where a v0.5 PyTorch architecture comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArchitectureDescr {
    FromFile {
        /// Packaged. Python source defining `callable`.
        source: FileSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sha256: Option<Sha256>,
        callable: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        kwargs: Map<String, Value>,
    },
    FromLibrary {
        callable: String,
        import_from: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        kwargs: Map<String, Value>,
    },
}

weights_entry!(KerasHdf5WeightsV0_5 {
    tensorflow_version: Version,
});

weights_entry!(OnnxWeightsV0_5 {
    opset_version: u32,
});

weights_entry!(PytorchStateDictWeightsV0_5 {
    architecture: ArchitectureDescr,
    pytorch_version: Version,
    /// Packaged. Conda environment file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dependencies: Option<FileDescr>,
});

weights_entry!(TensorflowJsWeightsV0_5 {
    tensorflow_version: Version,
});

weights_entry!(TensorflowSavedModelBundleWeightsV0_5 {
    tensorflow_version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dependencies: Option<FileDescr>,
});

weights_entry!(TorchscriptWeightsV0_5 {
    pytorch_version: Version,
});

macro_rules! weights_descr {
    ($(#[$meta:meta])* $name:ident {
        $keras:ty, $onnx:ty, $pytorch:ty, $tfjs:ty, $tfbundle:ty, $torchscript:ty $(,)?
    }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
        pub struct $name {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub keras_hdf5: Option<$keras>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub onnx: Option<$onnx>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub pytorch_state_dict: Option<$pytorch>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub tensorflow_js: Option<$tfjs>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub tensorflow_saved_model_bundle: Option<$tfbundle>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub torchscript: Option<$torchscript>,
        }

        impl $name {
            /// Present entries in canonical format order.
            pub fn entries(&self) -> Vec<(WeightsFormat, &WeightsEntryBase)> {
                let mut entries = Vec::new();
                if let Some(entry) = &self.keras_hdf5 {
                    entries.push((WeightsFormat::KerasHdf5, &entry.base));
                }
                if let Some(entry) = &self.onnx {
                    entries.push((WeightsFormat::Onnx, &entry.base));
                }
                if let Some(entry) = &self.pytorch_state_dict {
                    entries.push((WeightsFormat::PytorchStateDict, &entry.base));
                }
                if let Some(entry) = &self.tensorflow_js {
                    entries.push((WeightsFormat::TensorflowJs, &entry.base));
                }
                if let Some(entry) = &self.tensorflow_saved_model_bundle {
                    entries.push((WeightsFormat::TensorflowSavedModelBundle, &entry.base));
                }
                if let Some(entry) = &self.torchscript {
                    entries.push((WeightsFormat::Torchscript, &entry.base));
                }
                entries
            }

            pub fn is_empty(&self) -> bool {
                self.entries().is_empty()
            }
        }
    };
}

weights_descr!(
    /// v0.4 weights.
    WeightsDescrV0_4 {
        KerasHdf5WeightsV0_4,
        OnnxWeightsV0_4,
        PytorchStateDictWeightsV0_4,
        TensorflowJsWeightsV0_4,
        TensorflowSavedModelBundleWeightsV0_4,
        TorchscriptWeightsV0_4,
    }
);

weights_descr!(
    /// v0.5 weights.
    WeightsDescrV0_5 {
        KerasHdf5WeightsV0_5,
        OnnxWeightsV0_5,
        PytorchStateDictWeightsV0_5,
        TensorflowJsWeightsV0_5,
        TensorflowSavedModelBundleWeightsV0_5,
        TorchscriptWeightsV0_5,
    }
);

impl WeightsDescrV0_4 {
    /// Dependency declarations per format, in canonical order.
    pub fn dependencies(&self) -> Vec<(WeightsFormat, &LegacyDependencies)> {
        let candidates = [
            (WeightsFormat::KerasHdf5, self.keras_hdf5.as_ref().and_then(|e| e.dependencies.as_ref())),
            (WeightsFormat::Onnx, self.onnx.as_ref().and_then(|e| e.dependencies.as_ref())),
            (
                WeightsFormat::PytorchStateDict,
                self.pytorch_state_dict.as_ref().and_then(|e| e.dependencies.as_ref()),
            ),
            (
                WeightsFormat::TensorflowJs,
                self.tensorflow_js.as_ref().and_then(|e| e.dependencies.as_ref()),
            ),
            (
                WeightsFormat::TensorflowSavedModelBundle,
                self.tensorflow_saved_model_bundle
                    .as_ref()
                    .and_then(|e| e.dependencies.as_ref()),
            ),
            (
                WeightsFormat::Torchscript,
                self.torchscript.as_ref().and_then(|e| e.dependencies.as_ref()),
            ),
        ];
        candidates
            .into_iter()
            .filter_map(|(format, deps)| deps.map(|deps| (format, deps)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_in_canonical_order() {
        let weights: WeightsDescrV0_5 = serde_json::from_value(json!({
            "torchscript": {"source": "model.pt", "pytorch_version": "2.1", "parent": "pytorch_state_dict"},
            "pytorch_state_dict": {
                "source": "weights.pt",
                "pytorch_version": "2.1",
                "architecture": {"callable": "UNet", "import_from": "my_models.unet"}
            }
        }))
        .unwrap();
        let formats: Vec<_> = weights.entries().iter().map(|(f, _)| *f).collect();
        assert_eq!(
            formats,
            vec![WeightsFormat::PytorchStateDict, WeightsFormat::Torchscript]
        );
        assert_eq!(
            weights.entries()[1].1.parent,
            Some(WeightsFormat::PytorchStateDict)
        );
    }

    #[test]
    fn architecture_from_file_or_library() {
        let arch: ArchitectureDescr = serde_json::from_value(json!({
            "source": "unet.py",
            "callable": "UNet",
            "kwargs": {"depth": 4}
        }))
        .unwrap();
        assert!(matches!(arch, ArchitectureDescr::FromFile { .. }));

        let arch: ArchitectureDescr = serde_json::from_value(json!({
            "callable": "UNet",
            "import_from": "my_models"
        }))
        .unwrap();
        assert!(matches!(arch, ArchitectureDescr::FromLibrary { .. }));
    }

    #[test]
    fn legacy_dependencies_split() {
        let deps = LegacyDependencies::new("conda:environment.yaml");
        assert_eq!(deps.split(), Some(("conda", "environment.yaml")));
        assert_eq!(LegacyDependencies::new("npm:package.json").split(), None);
        assert_eq!(LegacyDependencies::new("conda:").split(), None);
    }

    #[test]
    fn legacy_architecture_from_file() {
        let arch = LegacyArchitecture::new("models/unet.py:UNet2d");
        assert_eq!(arch.from_file(), Some(("models/unet.py", "UNet2d")));
        assert_eq!(LegacyArchitecture::new("my_pkg.models.UNet").from_file(), None);
    }

    #[test]
    fn empty_weights() {
        let weights = WeightsDescrV0_4::default();
        assert!(weights.is_empty());
        assert_eq!(serde_json::to_value(&weights).unwrap(), json!({}));
    }
}
