//! End-to-end validation of description documents through the public API.

use std::fs;
use std::path::{Path, PathBuf};

use bioimageio_spec::common::BaseFields;
use bioimageio_spec::processing::ProcessingStep;
use bioimageio_spec::tensor::DataType;
use bioimageio_spec::{
    build_description, load_description, load_document, load_document_str, package_plan,
    resolve_axis_sizes, sha256_file, to_yaml_string, IssueKind, PackageError, ResolvedSize,
    ResourceType, SchemaVersion, ValidateError, ValidationOptions, Validated,
};
use serde_json::{json, Value};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn fixture_document(name: &str) -> Value {
    load_document(&fixture(name)).unwrap()
}

fn validate(document: &Value) -> Result<Validated, ValidateError> {
    build_description(document, &ValidationOptions::new())
}

fn expect_invalid(document: &Value) -> Vec<bioimageio_spec::FieldError> {
    match validate(document) {
        Err(ValidateError::Invalid { errors, .. }) => errors,
        other => panic!("expected validation errors, got {other:?}"),
    }
}

fn paths(errors: &[bioimageio_spec::FieldError]) -> Vec<&str> {
    errors.iter().map(|e| e.path.as_str()).collect()
}

/// Minimal valid v0.5 model with one uint8 input and one float32 output.
fn minimal_model() -> Value {
    json!({
        "type": "model",
        "format_version": "0.5.4",
        "name": "tiny model",
        "description": "smallest valid model",
        "authors": [{"name": "Ada Lovelace"}],
        "cite": [{"text": "paper", "doi": "10.1234/abcd"}],
        "license": "MIT",
        "documentation": "README.md",
        "covers": ["cover.png"],
        "inputs": [{
            "id": "raw",
            "axes": [{"type": "space", "id": "x", "size": 128}],
            "test_tensor": {"source": "in.npy"},
            "data": {"type": "uint8"}
        }],
        "outputs": [{
            "id": "probs",
            "axes": [{"type": "space", "id": "x", "size": {"tensor_id": "raw", "axis_id": "x", "offset": -4}}],
            "test_tensor": {"source": "out.npy"}
        }],
        "timestamp": "2024-01-01T00:00:00",
        "weights": {"onnx": {"source": "weights.onnx", "opset_version": 15}}
    })
}

mod fixtures {
    use super::*;

    #[test]
    fn unet2d_is_valid() {
        let validated = validate(&fixture_document("unet2d/bioimageio.yaml")).unwrap();
        assert!(validated.warnings.is_empty(), "{:?}", validated.warnings);
        assert_eq!(validated.descr.resource_type(), ResourceType::Model);
        assert_eq!(validated.descr.schema_version(), SchemaVersion::V0_5);
        assert_eq!(validated.descr.base().name(), "UNet 2D nuclei segmentation");
    }

    #[test]
    fn unet2d_normalizes_processing() {
        let validated = validate(&fixture_document("unet2d/bioimageio.yaml")).unwrap();
        let model = validated.descr.as_model_v0_5().unwrap();

        // the explicit ensure_dtype stays first and is not duplicated
        let pre = &model.inputs[0].preprocessing;
        assert_eq!(pre.len(), 2);
        assert!(matches!(pre[0], ProcessingStep::EnsureDtype(_)));
        assert!(matches!(pre[1], ProcessingStep::ScaleRange(_)));

        let post = &model.outputs[0].postprocessing;
        assert_eq!(post.len(), 2);
        assert!(matches!(post[0], ProcessingStep::Sigmoid));
        assert_eq!(post[1], ProcessingStep::ensure_dtype(DataType::Float32));
    }

    #[test]
    fn legacy_unet_is_valid_but_outdated() {
        let validated = validate(&fixture_document("legacy_unet/rdf.yaml")).unwrap();
        assert_eq!(validated.descr.schema_version(), SchemaVersion::V0_4);
        assert_eq!(validated.warnings.len(), 1);
        assert_eq!(validated.warnings[0].path, "format_version");
        assert_eq!(validated.warnings[0].kind, IssueKind::Note);
        assert!(validated.warnings[0].message.contains("0.5.4"));
    }

    #[test]
    fn outdated_dataset_warns() {
        let validated = validate(&fixture_document("nuclei_dataset/rdf.yaml")).unwrap();
        assert_eq!(validated.descr.resource_type(), ResourceType::Dataset);
        assert_eq!(paths(&validated.warnings), vec!["format_version"]);
        assert!(validated.warnings[0].message.contains("outdated"));
    }

    #[test]
    fn outdated_dataset_fails_in_strict_mode() {
        let options = ValidationOptions::new().strict(true);
        match build_description(&fixture_document("nuclei_dataset/rdf.yaml"), &options) {
            Err(ValidateError::Invalid { errors, warnings }) => {
                assert_eq!(paths(&errors), vec!["format_version"]);
                assert_eq!(warnings.len(), 1);
            }
            other => panic!("expected strict failure, got {other:?}"),
        }
    }

    #[test]
    fn broken_model_reports_every_error() {
        let errors = expect_invalid(&fixture_document("broken/rdf.yaml"));
        let found = paths(&errors);
        assert!(found.contains(&"inputs.0.axes.0.size"), "{found:?}");
        assert!(found.contains(&"outputs.0.axes.0.size"), "{found:?}");
        assert!(
            found.contains(&"outputs.0.postprocessing.0.kwargs.reference_tensor"),
            "{found:?}"
        );
        assert!(errors.iter().all(|e| e.kind == IssueKind::CrossField));
    }

    #[test]
    fn load_description_from_path() {
        let source = fixture("unet2d/bioimageio.yaml");
        let validated =
            load_description(source.to_str().unwrap(), &ValidationOptions::new()).unwrap();
        assert_eq!(validated.descr.format_version().to_string(), "0.5.4");
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let result = load_description("does/not/exist.yaml", &ValidationOptions::new());
        match result {
            Err(ValidateError::Load(e)) => assert_eq!(e.exit_code(), 3),
            other => panic!("expected a load error, got {other:?}"),
        }
    }
}

mod round_trip {
    use super::*;

    fn assert_round_trip(document: &Value) {
        let first = validate(document).unwrap();
        let yaml = to_yaml_string(&first.descr).unwrap();
        let reloaded = load_document_str(&yaml).unwrap();
        let second = validate(&reloaded).unwrap();
        assert_eq!(first.descr, second.descr, "round trip changed:\n{yaml}");
    }

    #[test]
    fn model_v0_5() {
        assert_round_trip(&fixture_document("unet2d/bioimageio.yaml"));
        assert_round_trip(&minimal_model());
    }

    #[test]
    fn model_v0_4() {
        assert_round_trip(&fixture_document("legacy_unet/rdf.yaml"));
    }

    #[test]
    fn dataset_v0_2() {
        assert_round_trip(&fixture_document("nuclei_dataset/rdf.yaml"));
    }

    #[test]
    fn every_remaining_version() {
        let cases = [
            json!({
                "type": "generic",
                "format_version": "0.2.4",
                "name": "plugin",
                "description": "a generic resource",
                "license": "MIT",
                "attachments": {"files": ["notes.txt"]},
                "download_url": "https://example.com/plugin.zip"
            }),
            json!({
                "type": "generic",
                "format_version": "0.3.0",
                "name": "plugin",
                "description": "a generic resource",
                "license": "MIT",
                "tags": ["segmentation"],
                "version": "1.2.0"
            }),
            json!({
                "type": "dataset",
                "format_version": "0.3.0",
                "name": "nuclei",
                "description": "annotated nuclei",
                "license": "CC-BY-4.0",
                "source": "https://example.com/nuclei.zip"
            }),
            json!({
                "type": "notebook",
                "format_version": "0.2.4",
                "name": "training notebook",
                "description": "trains the model",
                "license": "MIT",
                "source": "train.ipynb"
            }),
            json!({
                "type": "application",
                "format_version": "0.3.0",
                "name": "viewer",
                "description": "views images",
                "license": "MIT",
                "source": "viewer.imjoy.html"
            }),
            json!({
                "type": "collection",
                "format_version": "0.2.3",
                "name": "zoo",
                "description": "models",
                "license": "MIT",
                "collection": [{"rdf_source": "a/rdf.yaml", "id": "a"}]
            }),
        ];
        for document in &cases {
            assert_round_trip(document);
        }
    }

    #[test]
    fn other_resource_types() {
        assert_round_trip(&json!({
            "type": "notebook",
            "format_version": "0.3.0",
            "name": "training notebook",
            "description": "trains the model",
            "license": "MIT",
            "source": "train.ipynb",
            "attachments": [{"source": "helpers.py"}]
        }));
        assert_round_trip(&json!({
            "type": "collection",
            "format_version": "0.3.0",
            "name": "zoo",
            "description": "models",
            "license": "MIT",
            "collection": [{"entry_source": "a/rdf.yaml", "id": "a"}]
        }));
        assert_round_trip(&json!({
            "type": "application",
            "format_version": "0.2.4",
            "name": "viewer",
            "description": "views images",
            "license": "MIT",
            "source": "https://example.com/viewer.imjoy.html"
        }));
    }
}

mod model_rules {
    use super::*;

    #[test]
    fn reference_size_is_target_plus_offset() {
        let validated = validate(&minimal_model()).unwrap();
        let model = validated.descr.as_model_v0_5().unwrap();
        let sizes = resolve_axis_sizes(model).unwrap();
        let probs_x = sizes
            .iter()
            .find(|((tensor, axis), _)| tensor.as_str() == "probs" && axis.as_str() == "x")
            .map(|(_, size)| *size);
        assert_eq!(probs_x, Some(ResolvedSize::Fixed(124)));
    }

    #[test]
    fn reference_below_one_fails() {
        let mut doc = minimal_model();
        doc["outputs"][0]["axes"][0]["size"]["offset"] = json!(-128);
        let errors = expect_invalid(&doc);
        assert_eq!(paths(&errors), vec!["outputs.0.axes.0.size"]);
    }

    #[test]
    fn uint8_input_gets_ensure_dtype() {
        let validated = validate(&minimal_model()).unwrap();
        let model = validated.descr.as_model_v0_5().unwrap();
        assert_eq!(
            model.inputs[0].preprocessing,
            vec![ProcessingStep::ensure_dtype(DataType::Uint8)]
        );
    }

    #[test]
    fn percentiles_must_be_ordered() {
        let mut doc = minimal_model();
        doc["inputs"][0]["preprocessing"] = json!([{
            "id": "scale_range",
            "kwargs": {"min_percentile": 60, "max_percentile": 40}
        }]);
        let errors = expect_invalid(&doc);
        assert_eq!(
            paths(&errors),
            vec!["inputs.0.preprocessing.0.kwargs.max_percentile"]
        );
        assert_eq!(errors[0].kind, IssueKind::CrossField);
    }

    #[test]
    fn step_paths_use_written_indices() {
        let mut doc = minimal_model();
        doc["inputs"][0]["preprocessing"] = json!([
            {"id": "clip", "kwargs": {"min": 0.0, "max": 1.0}},
            {"id": "clip", "kwargs": {"min": 1.0, "max": 0.0}}
        ]);
        let errors = expect_invalid(&doc);
        assert_eq!(paths(&errors), vec!["inputs.0.preprocessing.1.kwargs"]);

        doc["inputs"][0]["preprocessing"][1]["kwargs"] = json!({"min": 0.0, "max": 1.0});
        let validated = validate(&doc).unwrap();
        let model = validated.descr.as_model_v0_5().unwrap();
        assert_eq!(model.inputs[0].preprocessing.len(), 3);
        assert_eq!(
            model.inputs[0].preprocessing[0],
            ProcessingStep::ensure_dtype(DataType::Uint8)
        );
    }

    #[test]
    fn impossible_timestamp_fails() {
        let mut doc = minimal_model();
        doc["timestamp"] = json!("2024-02-31T10:00:00");
        let errors = expect_invalid(&doc);
        assert_eq!(paths(&errors), vec!["timestamp"]);
        assert_eq!(errors[0].kind, IssueKind::Structural);
    }

    #[test]
    fn output_self_reference_follows_per_dataset_rule() {
        let mut doc = minimal_model();
        doc["outputs"][0]["postprocessing"] = json!([{
            "id": "scale_range",
            "kwargs": {"mode": "per_sample", "reference_tensor": "probs"}
        }]);
        let errors = expect_invalid(&doc);
        assert_eq!(
            paths(&errors),
            vec!["outputs.0.postprocessing.0.kwargs.reference_tensor"]
        );

        doc["outputs"][0]["postprocessing"][0]["kwargs"]["mode"] = json!("per_dataset");
        assert!(validate(&doc).is_ok());
    }

    #[test]
    fn data_dependent_output_bounds() {
        let mut doc = minimal_model();
        doc["outputs"][0]["axes"][0]["size"] = json!({"min": 16, "max": 8});
        let errors = expect_invalid(&doc);
        assert_eq!(paths(&errors), vec!["outputs.0.axes.0.size"]);
        assert_eq!(errors[0].kind, IssueKind::CrossField);
    }

    #[test]
    fn weights_must_form_a_tree() {
        let mut doc = minimal_model();
        doc["weights"] = json!({
            "onnx": {"source": "weights.onnx", "opset_version": 15, "parent": "torchscript"},
            "torchscript": {"source": "weights.pt", "pytorch_version": "2.1", "parent": "onnx"}
        });
        let errors = expect_invalid(&doc);
        assert!(paths(&errors).contains(&"weights"), "{errors:?}");

        doc["weights"]["torchscript"]
            .as_object_mut()
            .unwrap()
            .remove("parent");
        assert!(validate(&doc).is_ok());
    }

    #[test]
    fn single_weights_entry_needs_no_root_check() {
        let mut doc = minimal_model();
        doc["weights"]["onnx"]["parent"] = json!("torchscript");
        assert!(validate(&doc).is_ok());
    }

    #[test]
    fn per_sample_output_reference_fails() {
        let mut doc = minimal_model();
        doc["outputs"].as_array_mut().unwrap().push(json!({
            "id": "mask",
            "axes": [{"type": "space", "id": "x", "size": 124}],
            "test_tensor": {"source": "mask.npy"},
            "postprocessing": [{
                "id": "scale_range",
                "kwargs": {"mode": "per_sample", "reference_tensor": "probs"}
            }]
        }));
        let errors = expect_invalid(&doc);
        assert_eq!(
            paths(&errors),
            vec!["outputs.1.postprocessing.0.kwargs.reference_tensor"]
        );
        assert!(errors[0].message.contains("per_dataset"));

        doc["outputs"][1]["postprocessing"][0]["kwargs"]["mode"] = json!("per_dataset");
        assert!(validate(&doc).is_ok());
    }

    #[test]
    fn unknown_format_version() {
        let mut doc = minimal_model();
        doc["format_version"] = json!("99.0.0");
        let errors = expect_invalid(&doc);
        assert_eq!(paths(&errors), vec!["format_version"]);
        assert!(errors[0].message.contains("unrecognized format_version"));
    }

    #[test]
    fn newer_patch_version_warns() {
        let mut doc = minimal_model();
        doc["format_version"] = json!("0.5.9");
        let validated = validate(&doc).unwrap();
        assert_eq!(paths(&validated.warnings), vec!["format_version"]);
        assert!(validated.warnings[0].message.contains("newer"));
    }

    #[test]
    fn structural_errors_stop_before_cross_field_checks() {
        let mut doc = minimal_model();
        doc["inputs"][0]["axes"][0]["size"] = json!(0);
        doc["outputs"][0]["axes"][0]["size"]["offset"] = json!(-1000);
        let errors = expect_invalid(&doc);
        assert!(errors.iter().all(|e| e.kind == IssueKind::Structural));
        assert!(errors[0].path.starts_with("inputs.0.axes.0"));
    }
}

mod files {
    use super::*;

    const UNET_FILES: &[&str] = &[
        "README.md",
        "cover.png",
        "test_input.npy",
        "test_output.npy",
        "weights.pt",
        "weights_torchscript.pt",
        "unet.py",
    ];

    /// Copy the unet2d fixture into a temp dir together with its files.
    fn unet_package() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let rdf = dir.path().join("bioimageio.yaml");
        fs::copy(fixture("unet2d/bioimageio.yaml"), &rdf).unwrap();
        for name in UNET_FILES {
            fs::write(dir.path().join(name), format!("content of {name}")).unwrap();
        }
        (dir, rdf)
    }

    fn verify(rdf: &Path) -> Result<Validated, ValidateError> {
        let options = ValidationOptions::new().verify_files(true);
        load_description(rdf.to_str().unwrap(), &options)
    }

    #[test]
    fn all_files_present() {
        let (_dir, rdf) = unet_package();
        assert!(verify(&rdf).is_ok());
    }

    #[test]
    fn missing_weights_file() {
        let (dir, rdf) = unet_package();
        fs::remove_file(dir.path().join("weights.pt")).unwrap();
        match verify(&rdf) {
            Err(ValidateError::Invalid { errors, .. }) => {
                assert_eq!(paths(&errors), vec!["weights.pytorch_state_dict.source"]);
                assert!(errors[0].message.contains("file not found"));
            }
            other => panic!("expected a missing file, got {other:?}"),
        }
    }

    #[test]
    fn checksum_mismatch() {
        let (dir, rdf) = unet_package();
        let mut document = load_document(&rdf).unwrap();
        document["weights"]["torchscript"]["sha256"] = json!("0".repeat(64));
        fs::write(&rdf, serde_yaml::to_string(&document).unwrap()).unwrap();

        match verify(&rdf) {
            Err(ValidateError::Invalid { errors, .. }) => {
                assert_eq!(paths(&errors), vec!["weights.torchscript.source"]);
                assert!(errors[0].message.contains("sha256 mismatch"));
            }
            other => panic!("expected a checksum mismatch, got {other:?}"),
        }

        let actual = sha256_file(&dir.path().join("weights_torchscript.pt")).unwrap();
        document["weights"]["torchscript"]["sha256"] = json!(actual);
        fs::write(&rdf, serde_yaml::to_string(&document).unwrap()).unwrap();
        assert!(verify(&rdf).is_ok());
    }

    #[test]
    fn package_plan_lists_every_file() {
        let validated = validate(&fixture_document("unet2d/bioimageio.yaml")).unwrap();
        let plan = package_plan(&validated.descr).unwrap();

        let archive_names: Vec<&str> = plan
            .unique_files()
            .iter()
            .map(|f| f.archive_name.as_str())
            .collect();
        for name in UNET_FILES {
            assert!(archive_names.contains(name), "{name} not in {archive_names:?}");
        }
        assert_eq!(archive_names.len(), UNET_FILES.len());
        assert_eq!(
            plan.document["weights"]["pytorch_state_dict"]["architecture"]["source"],
            "unet.py"
        );
    }

    #[test]
    fn package_plan_localizes_legacy_references() {
        let validated = validate(&fixture_document("legacy_unet/rdf.yaml")).unwrap();
        let plan = package_plan(&validated.descr).unwrap();
        let weights = &plan.document["weights"]["pytorch_state_dict"];
        assert_eq!(weights["architecture"], "unet.py:UNet2d");
        assert_eq!(weights["dependencies"], "conda:environment.yaml");
    }

    #[test]
    fn package_plan_rejects_clashing_names() {
        let mut doc = minimal_model();
        doc["covers"] = json!(["a/cover.png", "b/cover.png"]);
        let validated = validate(&doc).unwrap();
        match package_plan(&validated.descr) {
            Err(PackageError::DuplicateArchiveName { name, .. }) => assert_eq!(name, "cover.png"),
            other => panic!("expected a name clash, got {other:?}"),
        }
    }
}
