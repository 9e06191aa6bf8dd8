//! bioimage.io resource descriptions
//!
//! Parsing and validation of versioned bioimage.io resource descriptions
//! (RDFs): models, datasets, notebooks, applications, collections and
//! generic resources, as YAML or JSON documents.
//!
//! Validation selects the schema family from `type` and `format_version`,
//! checks the document structurally against the published JSON Schema,
//! deserializes it into typed descriptions and then runs field and
//! cross-field checks. All errors of a pass are collected and reported
//! together with dotted field paths.
//!
//! # Example
//!
//! ```
//! use bioimageio_spec::{build_description, ResourceType, ValidateError, ValidationOptions};
//! use serde_json::json;
//!
//! let document = json!({
//!     "type": "dataset",
//!     "format_version": "0.3.0",
//!     "name": "nuclei",
//!     "description": "nuclei images",
//!     "license": "CC-BY-4.0"
//! });
//!
//! let validated = build_description(&document, &ValidationOptions::new()).unwrap();
//! assert_eq!(validated.descr.resource_type(), ResourceType::Dataset);
//! assert!(validated.warnings.is_empty());
//!
//! // Unknown format versions are rejected at the `format_version` field
//! let document = json!({"type": "dataset", "format_version": "99.0.0"});
//! match build_description(&document, &ValidationOptions::new()) {
//!     Err(ValidateError::Invalid { errors, .. }) => {
//!         assert_eq!(errors[0].path, "format_version");
//!     }
//!     other => panic!("expected a validation error, got {other:?}"),
//! }
//! ```
//!
//! # Issue kinds
//!
//! | Kind | Meaning | Fails validation |
//! |------|---------|------------------|
//! | `Structural` | wrong shape, type, pattern or enum value | yes |
//! | `CrossField` | fields that disagree with each other | yes |
//! | `Note` | advisory warning | only in strict mode |

pub mod axes;
pub mod common;
pub mod descr;
mod error;
pub mod fields;
mod json_schema;
mod linter;
mod loader;
pub mod model;
mod normalize;
mod packaging;
pub mod processing;
mod registry;
mod resolver;
pub mod tensor;
mod types;
mod validator;
mod verify;
pub mod weights;

pub use descr::ResourceDescr;
pub use error::{
    field_path_from_pointer, FieldError, IssueKind, LoadError, PackageError, ValidateError,
};
pub use json_schema::{json_schema, structural_errors, JSON_SCHEMA_DIALECT, MODEL_NAME_PATTERN};
pub use linter::{
    is_description_file, lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult,
    Severity,
};
pub use loader::{
    document_root, is_url, load_description, load_document, load_document_auto,
    load_document_str, to_json_value, to_yaml_string,
};
pub use normalize::{normalize_model, normalize_postprocessing, normalize_preprocessing};
pub use packaging::{package_plan, packaged_files, PackagePlan, PackagedFile, PlannedFile};
pub use registry::{
    build_description, known_format_versions, latest_format_version, select_schema, Validated,
};
pub use resolver::{resolve_axis_sizes, ResolvedSize};
pub use types::{FormatVersion, ResourceType, SchemaVersion, ValidationOptions};
pub use validator::{check_percentiles, MODEL_NAME_SOFT_LIMIT};
pub use verify::{sha256_file, verify_files};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
