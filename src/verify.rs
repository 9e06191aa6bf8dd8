//! Opt-in checks that packaged files exist and match their checksums.
//!
//! Local files are hashed on scoped threads; results come back in
//! enumeration order.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256 as Sha256Hasher};

use crate::descr::ResourceDescr;
use crate::error::FieldError;
use crate::packaging::{packaged_files, PackagedFile};
use crate::types::ValidationOptions;

/// Hex SHA256 digest of the file at `path`, streamed.
///
/// # Errors
///
/// Returns the I/O error from opening or reading the file.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check every packaged file of `descr`.
///
/// Relative sources resolve against `options.root` (default: the current
/// directory). URLs are only checked when `options.check_urls` is set.
pub fn verify_files(descr: &ResourceDescr, options: &ValidationOptions) -> Vec<FieldError> {
    let root = options
        .root
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let files = packaged_files(descr);
    let check_urls = options.check_urls;
    tracing::debug!(files = files.len(), root = %root.display(), "verifying packaged files");

    std::thread::scope(|scope| {
        let root = root.as_path();
        let handles: Vec<_> = files
            .iter()
            .map(|file| scope.spawn(move || verify_file(file, root, check_urls)))
            .collect();
        handles
            .into_iter()
            .zip(&files)
            .filter_map(|(handle, file)| {
                handle.join().unwrap_or_else(|_| {
                    Some(FieldError::cross_field(
                        file.path.clone(),
                        "file verification panicked",
                    ))
                })
            })
            .collect()
    })
}

fn verify_file(file: &PackagedFile, root: &Path, check_urls: bool) -> Option<FieldError> {
    let Some(path) = file.source.local_path(root) else {
        return if check_urls {
            check_url(file)
        } else {
            None
        };
    };

    if !path.is_file() {
        return Some(FieldError::cross_field(
            file.path.clone(),
            format!("file not found: {}", path.display()),
        ));
    }

    let expected = file.sha256.as_ref()?;
    match sha256_file(&path) {
        Ok(actual) if expected.matches_hex(&actual) => None,
        Ok(actual) => Some(FieldError::cross_field(
            file.path.clone(),
            format!("sha256 mismatch for {}: expected {expected}, got {actual}", path.display()),
        )),
        Err(e) => Some(FieldError::cross_field(
            file.path.clone(),
            format!("cannot read {}: {e}", path.display()),
        )),
    }
}

#[cfg(feature = "remote")]
fn check_url(file: &PackagedFile) -> Option<FieldError> {
    let url = file.source.as_string();
    let unreachable = |e: reqwest::Error| {
        FieldError::cross_field(file.path.clone(), format!("cannot reach {url}: {e}"))
    };

    let client = match reqwest::blocking::Client::builder()
        .timeout(crate::loader::HTTP_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(e) => return Some(unreachable(e)),
    };
    match client.head(&url).send().and_then(|r| r.error_for_status()) {
        Ok(_) => None,
        Err(e) => Some(unreachable(e)),
    }
}

#[cfg(not(feature = "remote"))]
fn check_url(file: &PackagedFile) -> Option<FieldError> {
    tracing::warn!(path = %file.path, "URL checks need the `remote` feature; skipped");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::build_description;
    use serde_json::json;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn notebook(source: &str, attachment_sha: Option<&str>) -> ResourceDescr {
        let mut attachment = json!({"source": "notes.txt"});
        if let Some(sha) = attachment_sha {
            attachment["sha256"] = json!(sha);
        }
        let doc = json!({
            "type": "notebook",
            "format_version": "0.3.0",
            "name": "demo",
            "description": "a demo",
            "license": "MIT",
            "attachments": [attachment],
            "source": source
        });
        build_description(&doc, &ValidationOptions::new()).unwrap().descr
    }

    #[test]
    fn sha256_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn missing_files_reported_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let options = ValidationOptions::new().verify_files(true).root(dir.path());
        let errors = verify_files(&notebook("demo.ipynb", None), &options);
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["attachments.0.source", "source"]);
    }

    #[test]
    fn checksum_mismatch_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("demo.ipynb"), "{}").unwrap();
        let options = ValidationOptions::new().verify_files(true).root(dir.path());

        let ok = verify_files(&notebook("demo.ipynb", Some(HELLO_SHA256)), &options);
        assert!(ok.is_empty());

        let wrong = "0".repeat(64);
        let errors = verify_files(&notebook("demo.ipynb", Some(&wrong)), &options);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("sha256 mismatch"));
    }

    #[test]
    fn urls_skipped_without_check_urls() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let options = ValidationOptions::new().verify_files(true).root(dir.path());
        let errors = verify_files(
            &notebook("https://example.invalid/demo.ipynb", None),
            &options,
        );
        assert!(errors.is_empty());
    }

    #[cfg(feature = "remote")]
    #[test]
    fn unreachable_url_reported() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("HEAD", "/demo.ipynb").with_status(404).create();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let options = ValidationOptions::new()
            .verify_files(true)
            .check_urls(true)
            .root(dir.path());

        let source = format!("{}/demo.ipynb", server.url());
        let errors = verify_files(&notebook(&source, None), &options);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "source");
    }
}
