//! Linting of description files on disk.
//!
//! Walks a directory for `rdf.yaml`, `bioimageio.yaml` and
//! `*.bioimageio.yaml` files, validates each one and reports diagnostics
//! with stable codes:
//! - `E001` the file cannot be loaded
//! - `E002` structural error
//! - `E003` cross-field inconsistency
//! - `W001` warning

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{FieldError, IssueKind, ValidateError};
use crate::loader::load_document;
use crate::registry::build_description;
use crate::types::ValidationOptions;

/// File names recognized as descriptions.
pub const DESCRIPTION_FILE_NAMES: &[&str] = &["rdf.yaml", "bioimageio.yaml"];

/// Suffix of named description files, such as `unet.bioimageio.yaml`.
pub const DESCRIPTION_FILE_SUFFIX: &str = ".bioimageio.yaml";

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One finding in a linted file.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// Dotted field path (e.g., "inputs.0.axes.2.size"); empty for the document.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn from_field_error(file: &Path, error: &FieldError) -> Self {
        let (severity, code) = match error.kind {
            IssueKind::Structural => (Severity::Error, "E002"),
            IssueKind::CrossField => (Severity::Error, "E003"),
            IssueKind::Note => (Severity::Warning, "W001"),
        };
        Self {
            severity,
            code: code.to_string(),
            file: file.to_path_buf(),
            path: error.path.clone(),
            message: error.message.clone(),
        }
    }
}

/// Diagnostics for one description file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome for one linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Totals and per-file results of one lint run.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if no file has errors.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// A directory is searched recursively for description files; a file is
/// linted whatever its name. If `strict` is true, files with warnings count
/// as failed.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_description_files(path);
    tracing::debug!(path = %path.display(), files = files.len(), "linting");

    let results: Vec<FileResult> = files.iter().map(|file| lint_file(file, path)).collect();
    let count = |severity: Severity| {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

/// Lint a single description file.
///
/// Relative file sources are not checked for existence; linting only looks
/// at the document.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let display = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();
    let display = if display.as_os_str().is_empty() {
        file.to_path_buf()
    } else {
        display
    };

    let diagnostics = match load_document(file) {
        Err(e) => vec![Diagnostic {
            severity: Severity::Error,
            code: "E001".to_string(),
            file: file.to_path_buf(),
            path: String::new(),
            message: format!("cannot load: {e}"),
        }],
        Ok(document) => {
            match build_description(&document, &ValidationOptions::new()) {
                Ok(validated) => validated
                    .warnings
                    .iter()
                    .map(|w| Diagnostic::from_field_error(file, w))
                    .collect(),
                Err(ValidateError::Invalid { errors, warnings }) => errors
                    .iter()
                    .chain(&warnings)
                    .map(|e| Diagnostic::from_field_error(file, e))
                    .collect(),
                Err(ValidateError::Load(e)) => vec![Diagnostic {
                    severity: Severity::Error,
                    code: "E001".to_string(),
                    file: file.to_path_buf(),
                    path: String::new(),
                    message: format!("cannot load: {e}"),
                }],
            }
        }
    };

    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let status = if has_errors {
        FileStatus::Error
    } else if diagnostics.is_empty() {
        FileStatus::Ok
    } else {
        FileStatus::Warning
    };

    FileResult {
        file: display,
        status,
        diagnostics,
    }
}

/// Whether `path` is named like a description file.
pub fn is_description_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| {
            DESCRIPTION_FILE_NAMES.contains(&name) || name.ends_with(DESCRIPTION_FILE_SUFFIX)
        })
}

fn collect_description_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if is_description_file(&path) {
            files.push(path);
        }
    }
}
