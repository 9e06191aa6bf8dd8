//! CLI integration tests for the bioimageio binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("bioimageio"))
}

// Helper to create a temp description file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn fixture(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

const DATASET: &str = r#"
type: dataset
format_version: 0.3.0
name: nuclei
description: nuclei images
license: CC-BY-4.0
"#;

const OUTDATED_DATASET: &str = r#"
type: dataset
format_version: 0.2.4
name: nuclei
description: nuclei images
license: CC-BY-4.0
"#;

mod validate_command {
    use super::*;

    #[test]
    fn valid_model() {
        cmd()
            .args(["validate", &fixture("unet2d/bioimageio.yaml")])
            .assert()
            .success()
            .stdout(predicate::str::contains("valid model (format_version 0.5.4)"));
    }

    #[test]
    fn valid_with_warning() {
        cmd()
            .args(["validate", &fixture("nuclei_dataset/rdf.yaml")])
            .assert()
            .success()
            .stdout(predicate::str::contains("valid dataset"))
            .stdout(predicate::str::contains("format_version: outdated"));
    }

    #[test]
    fn strict_fails_on_warning() {
        cmd()
            .args(["validate", &fixture("nuclei_dataset/rdf.yaml"), "--strict"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("validation failed"));
    }

    #[test]
    fn invalid_model_lists_errors() {
        cmd()
            .args(["validate", &fixture("broken/rdf.yaml")])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("validation failed"))
            .stderr(predicate::str::contains("inputs.0.axes.0.size"))
            .stderr(predicate::str::contains(
                "outputs.0.postprocessing.0.kwargs.reference_tensor",
            ));
    }

    #[test]
    fn missing_required_field_at_root() {
        let dir = TempDir::new().unwrap();
        let rdf = write_temp_file(
            &dir,
            "rdf.yaml",
            "type: dataset\nformat_version: 0.3.0\nname: nuclei\n",
        );

        cmd()
            .args(["validate", rdf.to_str().unwrap()])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("(root)"))
            .stderr(predicate::str::contains("description"));
    }

    #[test]
    fn unknown_format_version() {
        let dir = TempDir::new().unwrap();
        let rdf = write_temp_file(
            &dir,
            "rdf.yaml",
            "type: model\nformat_version: 99.0.0\n",
        );

        cmd()
            .args(["validate", rdf.to_str().unwrap()])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("unrecognized format_version"));
    }

    #[test]
    fn json_output_valid() {
        let output = cmd()
            .args(["validate", &fixture("nuclei_dataset/rdf.yaml"), "--json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(result["valid"], true);
        assert_eq!(result["type"], "dataset");
        assert_eq!(result["format_version"], "0.2.4");
        assert_eq!(result["warnings"][0]["path"], "format_version");
        assert_eq!(result["warnings"][0]["kind"], "note");
    }

    #[test]
    fn json_output_invalid() {
        let output = cmd()
            .args(["validate", &fixture("broken/rdf.yaml"), "--json"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));

        let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(result["valid"], false);
        let errors = result["errors"].as_array().unwrap();
        assert!(errors.iter().all(|e| e["kind"] == "cross_field"));
    }

    #[test]
    fn json_output_load_error() {
        cmd()
            .args(["validate", "/nonexistent/rdf.yaml", "--json"])
            .assert()
            .code(3)
            .stdout(predicate::str::contains(r#""valid":false"#))
            .stdout(predicate::str::contains("file not found"));
    }

    #[test]
    fn writes_normalized_description() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("normalized.yaml");

        cmd()
            .args([
                "validate",
                &fixture("unet2d/bioimageio.yaml"),
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success();

        let content = fs::read_to_string(&output).unwrap();
        let document: serde_json::Value = serde_yaml::from_str(&content).unwrap();
        let post = document["outputs"][0]["postprocessing"].as_array().unwrap();
        assert_eq!(post.len(), 2);
        assert_eq!(post[1]["id"], "ensure_dtype");
    }

    #[test]
    fn writes_json_when_asked() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("normalized.json");

        cmd()
            .args([
                "validate",
                &fixture("nuclei_dataset/rdf.yaml"),
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success();

        let document: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(document["name"], "Nuclei training data");
    }

    #[test]
    fn verify_files_reports_missing_files() {
        cmd()
            .args([
                "validate",
                &fixture("unet2d/bioimageio.yaml"),
                "--verify-files",
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("file not found"));
    }

    #[test]
    fn verify_files_passes_with_files_present() {
        let dir = TempDir::new().unwrap();
        fs::copy(
            fixture("unet2d/bioimageio.yaml"),
            dir.path().join("bioimageio.yaml"),
        )
        .unwrap();
        for name in [
            "README.md",
            "cover.png",
            "test_input.npy",
            "test_output.npy",
            "weights.pt",
            "weights_torchscript.pt",
            "unet.py",
        ] {
            write_temp_file(&dir, name, "data");
        }

        cmd()
            .args([
                "validate",
                dir.path().join("bioimageio.yaml").to_str().unwrap(),
                "--verify-files",
            ])
            .assert()
            .success();
    }
}

mod lint_command {
    use super::*;

    #[test]
    fn directory_all_valid() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "a/rdf.yaml", DATASET);
        write_temp_file(&dir, "b/nuclei.bioimageio.yaml", DATASET);
        write_temp_file(&dir, "c/notes.yaml", "not: a description");

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("2 files checked, all passed"));
    }

    #[test]
    fn directory_with_errors() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "good/rdf.yaml", DATASET);
        write_temp_file(&dir, "bad/rdf.yaml", "type: [unclosed");

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("error[E001]"))
            .stdout(predicate::str::contains("1 passed, 1 failed"));
    }

    #[test]
    fn warnings_pass_unless_strict() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "rdf.yaml", OUTDATED_DATASET);

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("warning[W001]"));

        cmd()
            .args(["lint", dir.path().to_str().unwrap(), "--strict"])
            .assert()
            .code(1);
    }

    #[test]
    fn quiet_hides_passing_files() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "good/rdf.yaml", DATASET);

        cmd()
            .args(["lint", dir.path().to_str().unwrap(), "--quiet"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Linting").not())
            .stdout(predicate::str::contains("good").not());
    }

    #[test]
    fn json_format() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "rdf.yaml", OUTDATED_DATASET);

        let output = cmd()
            .args(["lint", dir.path().to_str().unwrap(), "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(result["files_checked"], 1);
        assert_eq!(result["warnings"], 1);
        assert_eq!(result["results"][0]["status"], "warning");
        assert_eq!(result["results"][0]["diagnostics"][0]["code"], "W001");
    }

    #[test]
    fn explicit_file_with_any_name() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_file(&dir, "my-dataset.yaml", DATASET);

        cmd()
            .args(["lint", file.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 files checked"));
    }

    #[test]
    fn missing_path() {
        cmd()
            .args(["lint", "/nonexistent/dir"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("path not found"));
    }
}

mod schema_command {
    use super::*;

    #[test]
    fn model_schema() {
        let output = cmd()
            .args(["schema", "--type", "model", "--format-version", "0.5"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(
            schema["$schema"],
            "https://json-schema.org/draft/2020-12/schema"
        );
        assert!(schema["properties"]["inputs"].is_object());
    }

    #[test]
    fn pretty_output() {
        cmd()
            .args([
                "schema",
                "--type",
                "dataset",
                "--format-version",
                "0.3.0",
                "--pretty",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("{\n"));
    }

    #[test]
    fn output_file() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("schema.json");

        cmd()
            .args([
                "schema",
                "--type",
                "collection",
                "--format-version",
                "0.2",
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let content = fs::read_to_string(&output).unwrap();
        assert!(content.contains("rdf_source"));
    }

    #[test]
    fn unknown_type() {
        cmd()
            .args(["schema", "--type", "workflow", "--format-version", "0.5"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("unknown resource type"));
    }

    #[test]
    fn no_such_combination() {
        cmd()
            .args(["schema", "--type", "model", "--format-version", "0.3"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("no model schema"));
    }

    #[test]
    fn bad_version() {
        cmd()
            .args(["schema", "--type", "model", "--format-version", "latest"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("unknown format version"));
    }
}

mod package_command {
    use super::*;

    #[test]
    fn lists_files() {
        cmd()
            .args(["package", &fixture("unet2d/bioimageio.yaml")])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "weights.pytorch_state_dict.architecture.source",
            ))
            .stdout(predicate::str::contains("7 files to package"));
    }

    #[test]
    fn json_plan() {
        let output = cmd()
            .args(["package", &fixture("legacy_unet/rdf.yaml"), "--json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let files = result["files"].as_array().unwrap();
        assert!(files
            .iter()
            .any(|f| f["path"] == "weights.pytorch_state_dict.dependencies"
                && f["archive_name"] == "environment.yaml"));
    }

    #[test]
    fn writes_localized_document() {
        let dir = TempDir::new().unwrap();
        let rdf = write_temp_file(
            &dir,
            "rdf.yaml",
            r#"
type: notebook
format_version: 0.3.0
name: training notebook
description: trains the model
license: MIT
source: notebooks/train.ipynb
"#,
        );
        let output = dir.path().join("packaged.json");

        cmd()
            .args([
                "package",
                rdf.to_str().unwrap(),
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success();

        let document: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(document["source"], "train.ipynb");
    }

    #[test]
    fn clashing_archive_names() {
        let dir = TempDir::new().unwrap();
        let rdf = write_temp_file(
            &dir,
            "rdf.yaml",
            r#"
type: generic
format_version: 0.3.0
name: bundle
description: two covers with one name
license: MIT
covers: [a/cover.png, b/cover.png]
"#,
        );

        cmd()
            .args(["package", rdf.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("cover.png"));
    }

    #[test]
    fn refuses_invalid_description() {
        cmd()
            .args(["package", &fixture("broken/rdf.yaml")])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("cannot package"));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn file_not_found() {
        cmd()
            .args(["validate", "/nonexistent/rdf.yaml"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("file not found"));
    }

    #[test]
    fn invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let rdf = write_temp_file(&dir, "rdf.yaml", "type: [unclosed");

        cmd()
            .args(["validate", rdf.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid YAML"));
    }

    #[test]
    fn not_a_mapping() {
        let dir = TempDir::new().unwrap();
        let rdf = write_temp_file(&dir, "rdf.yaml", "- just\n- a list\n");

        cmd()
            .args(["validate", rdf.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("must be a mapping"));
    }

    #[test]
    fn invalid_json_file() {
        let dir = TempDir::new().unwrap();
        let rdf = write_temp_file(&dir, "rdf.json", "{not json");

        cmd()
            .args(["validate", rdf.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid JSON"));
    }

    #[test]
    fn output_write_failure() {
        cmd()
            .args([
                "validate",
                &fixture("nuclei_dataset/rdf.yaml"),
                "--output",
                "/nonexistent/dir/out.yaml",
            ])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("Error writing"));
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Validate and package bioimage.io resource descriptions",
            ));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("bioimageio"));
    }

    #[test]
    fn validate_help() {
        cmd()
            .args(["validate", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--verify-files"))
            .stdout(predicate::str::contains("--strict"))
            .stdout(predicate::str::contains("--json"));
    }

    #[test]
    fn missing_subcommand() {
        cmd().assert().failure();
    }
}

#[cfg(feature = "remote")]
mod remote {
    use super::*;

    #[test]
    fn validate_from_url() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/rdf.yaml")
            .with_status(200)
            .with_body(DATASET)
            .create();

        cmd()
            .args(["validate", &format!("{}/rdf.yaml", server.url())])
            .assert()
            .success()
            .stdout(predicate::str::contains("valid dataset"));
        mock.assert();
    }

    #[test]
    fn url_404() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/missing.yaml").with_status(404).create();

        cmd()
            .args(["validate", &format!("{}/missing.yaml", server.url())])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("failed to fetch"));
    }

    #[test]
    fn check_urls_reports_unreachable_sources() {
        let mut server = mockito::Server::new();
        let _ok = server.mock("HEAD", "/cover.png").with_status(200).create();
        let _missing = server.mock("HEAD", "/train.ipynb").with_status(404).create();

        let dir = TempDir::new().unwrap();
        let rdf = write_temp_file(
            &dir,
            "rdf.yaml",
            &format!(
                "type: notebook\nformat_version: 0.3.0\nname: training notebook\n\
                 description: trains the model\nlicense: MIT\n\
                 covers:\n  - {url}/cover.png\nsource: {url}/train.ipynb\n",
                url = server.url()
            ),
        );

        cmd()
            .args(["validate", rdf.to_str().unwrap(), "--check-urls"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("source: cannot reach"))
            .stderr(predicate::str::contains("covers.0").not());
    }
}
