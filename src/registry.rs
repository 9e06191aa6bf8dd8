//! Schema selection and the validation pipeline.
//!
//! A document's `type` and `format_version` select one concrete schema.
//! The document then passes through the structural pass, typed parsing,
//! normalization, field checks, cross-field checks and, on request, file
//! verification.

use serde_json::Value;

use crate::descr::{
    ApplicationDescr, CollectionDescr, DatasetDescr, GenericDescr, NotebookDescr, ResourceDescr,
};
use crate::error::{FieldError, IssueKind, ValidateError};
use crate::json_schema::{json_schema, structural_errors};
use crate::model::{ModelDescr, ModelDescrV0_5};
use crate::normalize::normalize_model;
use crate::types::{
    json_type_name, FormatVersion, ResourceType, SchemaVersion, ValidationOptions, RESOURCE_TYPES,
};
use crate::{resolver, validator, verify};

const GENERIC_FAMILIES: &[(SchemaVersion, FormatVersion)] = &[
    (SchemaVersion::V0_2, FormatVersion::new(0, 2, 4)),
    (SchemaVersion::V0_3, FormatVersion::new(0, 3, 0)),
];

const COLLECTION_FAMILIES: &[(SchemaVersion, FormatVersion)] = &[
    (SchemaVersion::V0_2, FormatVersion::new(0, 2, 3)),
    (SchemaVersion::V0_3, FormatVersion::new(0, 3, 0)),
];

const MODEL_FAMILIES: &[(SchemaVersion, FormatVersion)] = &[
    (SchemaVersion::V0_4, FormatVersion::new(0, 4, 10)),
    (SchemaVersion::V0_5, FormatVersion::new(0, 5, 4)),
];

/// Known schema families of `resource_type` with their latest format
/// version, oldest first.
pub fn known_format_versions(
    resource_type: ResourceType,
) -> &'static [(SchemaVersion, FormatVersion)] {
    match resource_type {
        ResourceType::Model => MODEL_FAMILIES,
        ResourceType::Collection => COLLECTION_FAMILIES,
        ResourceType::Application
        | ResourceType::Dataset
        | ResourceType::Generic
        | ResourceType::Notebook => GENERIC_FAMILIES,
    }
}

/// The newest format version known for `resource_type`.
pub fn latest_format_version(resource_type: ResourceType) -> FormatVersion {
    known_format_versions(resource_type)
        .last()
        .map(|(_, latest)| *latest)
        .unwrap_or(FormatVersion::new(0, 0, 0))
}

/// Choose the schema family for a declared version.
///
/// Returns the family and the warnings that selection produced, or a
/// structural error at `format_version`.
pub fn select_schema(
    resource_type: ResourceType,
    version: FormatVersion,
) -> Result<(SchemaVersion, Vec<FieldError>), FieldError> {
    let families = known_format_versions(resource_type);
    let newest = latest_format_version(resource_type);

    let Some((schema, latest)) = families
        .iter()
        .find(|(schema, _)| schema.family() == version.family())
    else {
        let known = families
            .iter()
            .map(|(schema, _)| schema.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(FieldError::structural(
            "format_version",
            format!("unrecognized format_version {version} for {resource_type} (known: {known})"),
        ));
    };

    let mut warnings = Vec::new();
    if version > *latest {
        warnings.push(FieldError::note(
            "format_version",
            format!(
                "format_version {version} is newer than the latest known {latest}; validating as {latest}"
            ),
        ));
    }
    if latest.family() != newest.family() {
        warnings.push(FieldError::note(
            "format_version",
            format!("outdated format_version {version}; the latest is {newest}"),
        ));
    }
    Ok((*schema, warnings))
}

/// A successfully validated description with its non-fatal notes.
#[derive(Debug, Clone)]
pub struct Validated {
    pub descr: ResourceDescr,
    pub warnings: Vec<FieldError>,
}

/// Validate a parsed document and build its typed description.
///
/// All errors of a pass are reported together. A failed structural pass
/// stops the pipeline.
///
/// # Errors
///
/// Returns `ValidateError::Invalid` with every error and warning found.
pub fn build_description(
    document: &Value,
    options: &ValidationOptions,
) -> Result<Validated, ValidateError> {
    let (resource_type, schema, warnings) = read_header(document).map_err(|errors| {
        ValidateError::Invalid {
            errors,
            warnings: Vec::new(),
        }
    })?;
    tracing::debug!(%resource_type, %schema, "selected schema");

    let Some(published) = json_schema(resource_type, schema) else {
        let error = FieldError::structural(
            "format_version",
            format!("no schema for {resource_type} {schema}"),
        );
        return Err(reject(vec![error], warnings, options.strict));
    };
    let structural = structural_errors(&published, document);
    if !structural.is_empty() {
        tracing::debug!(count = structural.len(), "structural pass failed");
        return Err(reject(structural, warnings, options.strict));
    }

    let mut descr = parse_typed(resource_type, schema, document.clone())
        .map_err(|error| reject(vec![error], warnings.clone(), options.strict))?;

    let mut issues = validator::check(&descr);
    issues.extend(resolver::check(&descr));
    if options.verify_files {
        issues.extend(verify::verify_files(&descr, options));
    }
    // Step indices in the issues above refer to the lists as written.
    if let ResourceDescr::Model(ModelDescr::V0_5(model)) = &mut descr {
        normalize_model(model);
    }

    let (notes, errors): (Vec<_>, Vec<_>) = issues
        .into_iter()
        .partition(|issue| issue.kind == IssueKind::Note);
    let mut warnings = warnings;
    warnings.extend(notes);
    tracing::debug!(
        errors = errors.len(),
        warnings = warnings.len(),
        "validation finished"
    );

    if errors.is_empty() && (warnings.is_empty() || !options.strict) {
        Ok(Validated { descr, warnings })
    } else {
        Err(reject(errors, warnings, options.strict))
    }
}

/// Build the `Invalid` error; strict mode turns warnings into errors.
fn reject(mut errors: Vec<FieldError>, mut warnings: Vec<FieldError>, strict: bool) -> ValidateError {
    if strict {
        errors.append(&mut warnings);
    }
    ValidateError::Invalid { errors, warnings }
}

/// Read and check `type` and `format_version`, reporting both at once.
fn read_header(
    document: &Value,
) -> Result<(ResourceType, SchemaVersion, Vec<FieldError>), Vec<FieldError>> {
    let Some(map) = document.as_object() else {
        return Err(vec![FieldError::structural(
            "",
            format!(
                "resource description must be a mapping, got {}",
                json_type_name(document)
            ),
        )]);
    };

    let resource_type = match map.get("type") {
        None => Err(FieldError::structural("type", "missing field `type`")),
        Some(Value::String(tag)) => ResourceType::parse(tag).ok_or_else(|| {
            FieldError::structural(
                "type",
                format!(
                    "unknown resource type \"{tag}\" (expected one of: {})",
                    RESOURCE_TYPES.join(", ")
                ),
            )
        }),
        Some(other) => Err(FieldError::structural(
            "type",
            format!("expected a string, got {}", json_type_name(other)),
        )),
    };

    let version = match map.get("format_version") {
        None => Err(FieldError::structural(
            "format_version",
            "missing field `format_version`",
        )),
        Some(Value::String(raw)) => FormatVersion::parse(raw).ok_or_else(|| {
            FieldError::structural(
                "format_version",
                format!("invalid format_version \"{raw}\": expected MAJOR.MINOR.PATCH"),
            )
        }),
        Some(other) => Err(FieldError::structural(
            "format_version",
            format!("expected a string, got {}", json_type_name(other)),
        )),
    };

    match (resource_type, version) {
        (Ok(resource_type), Ok(version)) => {
            let (schema, warnings) = select_schema(resource_type, version).map_err(|e| vec![e])?;
            Ok((resource_type, schema, warnings))
        }
        (resource_type, version) => Err(resource_type
            .err()
            .into_iter()
            .chain(version.err())
            .collect()),
    }
}

fn from_value<T: serde::de::DeserializeOwned>(document: Value) -> Result<T, FieldError> {
    serde_json::from_value(document).map_err(|e| FieldError::structural("", e.to_string()))
}

/// Deserialize into the typed description selected by the header.
fn parse_typed(
    resource_type: ResourceType,
    schema: SchemaVersion,
    document: Value,
) -> Result<ResourceDescr, FieldError> {
    use SchemaVersion::{V0_2, V0_3, V0_4, V0_5};

    let descr = match (resource_type, schema) {
        (ResourceType::Generic, V0_2) => ResourceDescr::Generic(GenericDescr::V0_2(from_value(document)?)),
        (ResourceType::Generic, V0_3) => ResourceDescr::Generic(GenericDescr::V0_3(from_value(document)?)),
        (ResourceType::Dataset, V0_2) => ResourceDescr::Dataset(DatasetDescr::V0_2(from_value(document)?)),
        (ResourceType::Dataset, V0_3) => ResourceDescr::Dataset(DatasetDescr::V0_3(from_value(document)?)),
        (ResourceType::Notebook, V0_2) => {
            ResourceDescr::Notebook(NotebookDescr::V0_2(from_value(document)?))
        }
        (ResourceType::Notebook, V0_3) => {
            ResourceDescr::Notebook(NotebookDescr::V0_3(from_value(document)?))
        }
        (ResourceType::Application, V0_2) => {
            ResourceDescr::Application(ApplicationDescr::V0_2(from_value(document)?))
        }
        (ResourceType::Application, V0_3) => {
            ResourceDescr::Application(ApplicationDescr::V0_3(from_value(document)?))
        }
        (ResourceType::Collection, V0_2) => {
            ResourceDescr::Collection(CollectionDescr::V0_2(from_value(document)?))
        }
        (ResourceType::Collection, V0_3) => {
            ResourceDescr::Collection(CollectionDescr::V0_3(from_value(document)?))
        }
        (ResourceType::Model, V0_4) => {
            ResourceDescr::Model(ModelDescr::V0_4(Box::new(from_value(document)?)))
        }
        (ResourceType::Model, V0_5) => {
            let model: ModelDescrV0_5 = from_value(document)?;
            ResourceDescr::Model(ModelDescr::V0_5(Box::new(model)))
        }
        (resource_type, schema) => {
            return Err(FieldError::structural(
                "format_version",
                format!("no schema for {resource_type} {schema}"),
            ))
        }
    };
    Ok(descr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn errors_of(result: Result<Validated, ValidateError>) -> Vec<FieldError> {
        match result {
            Err(ValidateError::Invalid { errors, .. }) => errors,
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn selects_exact_family() {
        let (schema, warnings) =
            select_schema(ResourceType::Model, FormatVersion::new(0, 5, 4)).unwrap();
        assert_eq!(schema, SchemaVersion::V0_5);
        assert!(warnings.is_empty());
    }

    #[test]
    fn newer_patch_warns() {
        let (schema, warnings) =
            select_schema(ResourceType::Model, FormatVersion::new(0, 5, 9)).unwrap();
        assert_eq!(schema, SchemaVersion::V0_5);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("newer than the latest known 0.5.4"));
    }

    #[test]
    fn outdated_family_warns() {
        let (schema, warnings) =
            select_schema(ResourceType::Dataset, FormatVersion::new(0, 2, 4)).unwrap();
        assert_eq!(schema, SchemaVersion::V0_2);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("outdated format_version"));
    }

    #[test]
    fn unknown_families_rejected() {
        for version in [
            FormatVersion::new(99, 0, 0),
            FormatVersion::new(0, 6, 0),
            FormatVersion::new(0, 1, 0),
        ] {
            let err = select_schema(ResourceType::Model, version).unwrap_err();
            assert_eq!(err.path, "format_version");
            assert!(err.message.contains("unrecognized format_version"));
        }
        assert!(select_schema(ResourceType::Generic, FormatVersion::new(0, 4, 0)).is_err());
    }

    #[test]
    fn missing_header_fields_reported_together() {
        let errors = errors_of(build_description(&json!({"name": "x"}), &ValidationOptions::new()));
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["type", "format_version"]);
        assert!(errors.iter().all(|e| e.kind == IssueKind::Structural));
    }

    #[test]
    fn unknown_type_rejected() {
        let doc = json!({"type": "workflow", "format_version": "0.3.0"});
        let errors = errors_of(build_description(&doc, &ValidationOptions::new()));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "type");
    }

    #[test]
    fn non_mapping_rejected() {
        let errors = errors_of(build_description(&json!([1, 2]), &ValidationOptions::new()));
        assert_eq!(errors[0].path, "");
        assert!(errors[0].message.contains("array"));
    }

    #[test]
    fn generic_v0_3_validates() {
        let doc = json!({
            "type": "generic",
            "format_version": "0.3.0",
            "name": "thing",
            "description": "a thing",
            "license": "MIT"
        });
        let validated = build_description(&doc, &ValidationOptions::new()).unwrap();
        assert_eq!(validated.descr.schema_version(), SchemaVersion::V0_3);
        assert!(validated.warnings.is_empty());
    }

    #[test]
    fn strict_turns_warnings_into_errors() {
        let doc = json!({
            "type": "generic",
            "format_version": "0.2.4",
            "name": "thing",
            "description": "a thing",
            "license": "MIT"
        });
        let lenient = build_description(&doc, &ValidationOptions::new()).unwrap();
        assert_eq!(lenient.warnings.len(), 1);

        let errors = errors_of(build_description(&doc, &ValidationOptions::new().strict(true)));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, IssueKind::Note);
    }

    #[test]
    fn structural_errors_stop_the_pipeline() {
        let doc = json!({
            "type": "notebook",
            "format_version": "0.3.0",
            "name": "demo"
        });
        let errors = errors_of(build_description(&doc, &ValidationOptions::new()));
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == IssueKind::Structural));
    }
}
