//! Enumeration of the files a description packages, and the plan for
//! copying them into a flat archive.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::common::BaseFields;
use crate::descr::{ApplicationDescr, CollectionDescr, NotebookDescr, ResourceDescr};
use crate::error::{child_path, PackageError};
use crate::fields::{FileSource, Icon, Sha256};
use crate::model::{ModelDescr, ModelDescrV0_4, ModelDescrV0_5};
use crate::weights::ArchitectureDescr;

/// A file referenced by a packaged field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackagedFile {
    /// Dotted path of the field holding the reference.
    pub path: String,
    pub source: FileSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Sha256>,
    /// Text around the file reference inside the field value, as in
    /// `conda:environment.yaml` or `unet.py:UNet`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl PackagedFile {
    fn new(path: impl Into<String>, source: &FileSource, sha256: Option<&Sha256>) -> Self {
        Self {
            path: path.into(),
            source: source.clone(),
            sha256: sha256.cloned(),
            prefix: None,
            suffix: None,
        }
    }
}

/// Every packaged file of `descr`, in document order.
pub fn packaged_files(descr: &ResourceDescr) -> Vec<PackagedFile> {
    let mut files = base_files(descr.base());

    match descr {
        ResourceDescr::Notebook(NotebookDescr::V0_2(notebook)) => {
            files.push(PackagedFile::new("source", &notebook.source, None));
        }
        ResourceDescr::Notebook(NotebookDescr::V0_3(notebook)) => {
            files.push(PackagedFile::new("source", &notebook.source, None));
        }
        ResourceDescr::Application(ApplicationDescr::V0_2(app)) => {
            if let Some(source) = &app.source {
                files.push(PackagedFile::new("source", source, None));
            }
        }
        ResourceDescr::Application(ApplicationDescr::V0_3(app)) => {
            if let Some(source) = &app.source {
                files.push(PackagedFile::new("source", source, None));
            }
        }
        ResourceDescr::Collection(CollectionDescr::V0_2(collection)) => {
            for (i, entry) in collection.collection.iter().enumerate() {
                if let Some(source) = &entry.rdf_source {
                    let path = format!("collection.{i}.rdf_source");
                    files.push(PackagedFile::new(path, source, None));
                }
            }
        }
        ResourceDescr::Collection(CollectionDescr::V0_3(collection)) => {
            for (i, entry) in collection.collection.iter().enumerate() {
                if let Some(source) = &entry.entry_source {
                    let path = format!("collection.{i}.entry_source");
                    files.push(PackagedFile::new(path, source, None));
                }
            }
        }
        ResourceDescr::Model(ModelDescr::V0_4(model)) => model_v0_4_files(model, &mut files),
        ResourceDescr::Model(ModelDescr::V0_5(model)) => model_v0_5_files(model, &mut files),
        ResourceDescr::Generic(_) | ResourceDescr::Dataset(_) => {}
    }

    files
}

fn base_files(base: &dyn BaseFields) -> Vec<PackagedFile> {
    let mut files: Vec<PackagedFile> = base
        .attachment_files()
        .into_iter()
        .map(|(path, source, sha256)| PackagedFile::new(path, source, sha256))
        .collect();
    for (i, cover) in base.covers().iter().enumerate() {
        files.push(PackagedFile::new(child_path("covers", i), cover, None));
    }
    if let Some(documentation) = base.documentation() {
        files.push(PackagedFile::new("documentation", documentation, None));
    }
    if let Some(Icon::File(icon)) = base.icon() {
        files.push(PackagedFile::new("icon", icon, None));
    }
    files
}

fn model_v0_4_files(model: &ModelDescrV0_4, files: &mut Vec<PackagedFile>) {
    for (field, sources) in [
        ("test_inputs", &model.test_inputs),
        ("test_outputs", &model.test_outputs),
        ("sample_inputs", &model.sample_inputs),
        ("sample_outputs", &model.sample_outputs),
    ] {
        for (i, source) in sources.iter().enumerate() {
            files.push(PackagedFile::new(child_path(field, i), source, None));
        }
    }

    for (format, entry) in model.weights.entries() {
        let path = format!("weights.{format}");
        files.push(PackagedFile::new(
            child_path(&path, "source"),
            &entry.source,
            entry.sha256.as_ref(),
        ));
    }

    if let Some(pytorch) = &model.weights.pytorch_state_dict {
        if let Some((file, callable)) = pytorch.architecture.from_file() {
            match FileSource::new(file) {
                Ok(source) => files.push(PackagedFile {
                    suffix: Some(format!(":{callable}")),
                    ..PackagedFile::new(
                        "weights.pytorch_state_dict.architecture",
                        &source,
                        pytorch.architecture_sha256.as_ref(),
                    )
                }),
                Err(e) => tracing::debug!(error = %e, "architecture has no file part"),
            }
        }
    }

    for (format, dependencies) in model.weights.dependencies() {
        let Some((manager, file)) = dependencies.split() else {
            continue;
        };
        if let Ok(source) = FileSource::new(file) {
            files.push(PackagedFile {
                prefix: Some(format!("{manager}:")),
                ..PackagedFile::new(format!("weights.{format}.dependencies"), &source, None)
            });
        }
    }
}

fn model_v0_5_files(model: &ModelDescrV0_5, files: &mut Vec<PackagedFile>) {
    let tensors = model
        .inputs
        .iter()
        .map(|t| ("inputs", &t.test_tensor, t.sample_tensor.as_ref()))
        .chain(
            model
                .outputs
                .iter()
                .map(|t| ("outputs", &t.test_tensor, t.sample_tensor.as_ref())),
        );
    let mut index = HashMap::new();
    for (section, test_tensor, sample_tensor) in tensors {
        let i = index.entry(section).or_insert(0usize);
        let path = format!("{section}.{i}");
        files.push(PackagedFile::new(
            format!("{path}.test_tensor.source"),
            &test_tensor.source,
            test_tensor.sha256.as_ref(),
        ));
        if let Some(sample) = sample_tensor {
            files.push(PackagedFile::new(
                format!("{path}.sample_tensor.source"),
                &sample.source,
                sample.sha256.as_ref(),
            ));
        }
        *i += 1;
    }

    for (format, entry) in model.weights.entries() {
        files.push(PackagedFile::new(
            format!("weights.{format}.source"),
            &entry.source,
            entry.sha256.as_ref(),
        ));
    }

    if let Some(pytorch) = &model.weights.pytorch_state_dict {
        if let ArchitectureDescr::FromFile { source, sha256, .. } = &pytorch.architecture {
            files.push(PackagedFile::new(
                "weights.pytorch_state_dict.architecture.source",
                source,
                sha256.as_ref(),
            ));
        }
        if let Some(dependencies) = &pytorch.dependencies {
            files.push(PackagedFile::new(
                "weights.pytorch_state_dict.dependencies.source",
                &dependencies.source,
                dependencies.sha256.as_ref(),
            ));
        }
    }
    if let Some(bundle) = &model.weights.tensorflow_saved_model_bundle {
        if let Some(dependencies) = &bundle.dependencies {
            files.push(PackagedFile::new(
                "weights.tensorflow_saved_model_bundle.dependencies.source",
                &dependencies.source,
                dependencies.sha256.as_ref(),
            ));
        }
    }
}

/// A packaged file and the name it gets inside the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    pub path: String,
    pub source: FileSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Sha256>,
    pub archive_name: String,
}

/// Archive layout for a description: where each file goes, and the
/// document rewritten to point at the archive-local names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackagePlan {
    pub files: Vec<PlannedFile>,
    pub document: Value,
}

impl PackagePlan {
    /// Distinct sources to copy, one per archive name.
    pub fn unique_files(&self) -> Vec<&PlannedFile> {
        let mut seen = std::collections::HashSet::new();
        self.files
            .iter()
            .filter(|file| seen.insert(file.archive_name.as_str()))
            .collect()
    }
}

/// Plan a flat archive for `descr`.
///
/// Each source is stored under its file name. A source referenced by
/// several fields is stored once.
///
/// # Errors
///
/// Returns `PackageError::DuplicateArchiveName` if two different sources
/// share a file name, and `PackageError::NoFileName` for sources without
/// one.
pub fn package_plan(descr: &ResourceDescr) -> Result<PackagePlan, PackageError> {
    let mut document =
        serde_json::to_value(descr).map_err(|source| PackageError::Serialize { source })?;
    let mut claimed: HashMap<String, (FileSource, String)> = HashMap::new();
    let mut planned = Vec::new();

    for file in packaged_files(descr) {
        let archive_name = file.source.file_name().ok_or_else(|| PackageError::NoFileName {
            path: file.path.clone(),
            source_str: file.source.to_string(),
        })?;

        match claimed.get(&archive_name) {
            Some((source, first)) if *source != file.source => {
                return Err(PackageError::DuplicateArchiveName {
                    name: archive_name,
                    first: first.clone(),
                    second: file.path,
                });
            }
            Some(_) => {}
            None => {
                claimed.insert(archive_name.clone(), (file.source.clone(), file.path.clone()));
            }
        }

        let pointer = format!("/{}", file.path.replace('.', "/"));
        let localized = format!(
            "{}{archive_name}{}",
            file.prefix.as_deref().unwrap_or(""),
            file.suffix.as_deref().unwrap_or("")
        );
        match document.pointer_mut(&pointer) {
            Some(slot) => *slot = Value::String(localized),
            None => tracing::warn!(path = %file.path, "packaged field missing from serialized document"),
        }

        planned.push(PlannedFile {
            path: file.path,
            source: file.source,
            sha256: file.sha256,
            archive_name,
        });
    }

    tracing::debug!(files = planned.len(), "package plan ready");
    Ok(PackagePlan {
        files: planned,
        document,
    })
}
