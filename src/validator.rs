//! Field-level checks on a typed description.
//!
//! Runs after the structural pass, so every value already has the right
//! shape. What is left are rules the published schema cannot express:
//! license status, ORCID checksums, file suffixes, URL syntax, orderings
//! between sibling values and advisory notes.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::axes::{AxisDescr, SizeSpec};
use crate::common::{Author, BaseFields};
use crate::descr::{DatasetDescr, NotebookDescr, ResourceDescr};
use crate::error::{child_path, FieldError};
use crate::fields::{
    FileSource, HttpUrl, Icon, LicenseStatus, ARCHITECTURE_SUFFIXES, COVER_SUFFIXES,
    DOCUMENTATION_SUFFIXES, ENVIRONMENT_SUFFIXES, NOTEBOOK_SUFFIXES, SAMPLE_TENSOR_SUFFIXES,
    TEST_TENSOR_SUFFIXES,
};
use crate::model::{ModelDescr, ModelDescrV0_4, ModelDescrV0_5};
use crate::packaging::packaged_files;
use crate::processing::{
    BinarizeKwargs, FixedZeroMeanUnitVarianceKwargs, FloatOrList, LegacyProcessingStep,
    ProcessingMode, ProcessingStep, ScaleLinearKwargs,
};
use crate::tensor::TensorDataDescr;
use crate::weights::ArchitectureDescr;

/// Names longer than this get a warning; the hard limit is 128.
pub const MODEL_NAME_SOFT_LIMIT: usize = 64;

/// Run all field checks. Notes come back with [`crate::IssueKind::Note`].
pub(crate) fn check(descr: &ResourceDescr) -> Vec<FieldError> {
    let mut issues = Vec::new();
    let is_model = matches!(descr, ResourceDescr::Model(_));

    check_base(descr.base(), is_model, &mut issues);
    check_urls(descr, &mut issues);

    match descr {
        ResourceDescr::Dataset(DatasetDescr::V0_2(dataset)) => {
            check_http_url("source", dataset.source.as_ref(), &mut issues);
        }
        ResourceDescr::Dataset(DatasetDescr::V0_3(dataset)) => {
            check_http_url("source", dataset.source.as_ref(), &mut issues);
        }
        ResourceDescr::Notebook(NotebookDescr::V0_2(notebook)) => {
            check_suffix("source", &notebook.source, NOTEBOOK_SUFFIXES, &mut issues);
        }
        ResourceDescr::Notebook(NotebookDescr::V0_3(notebook)) => {
            check_suffix("source", &notebook.source, NOTEBOOK_SUFFIXES, &mut issues);
        }
        ResourceDescr::Model(ModelDescr::V0_4(model)) => check_model_v0_4(model, &mut issues),
        ResourceDescr::Model(ModelDescr::V0_5(model)) => check_model_v0_5(model, &mut issues),
        _ => {}
    }

    issues
}

fn check_base(base: &dyn BaseFields, is_model: bool, issues: &mut Vec<FieldError>) {
    match base.license() {
        Some(license) => match license.status() {
            LicenseStatus::Current => {}
            LicenseStatus::Deprecated => issues.push(FieldError::note(
                "license",
                format!("license id \"{license}\" is deprecated"),
            )),
            LicenseStatus::Unknown => issues.push(FieldError::structural(
                "license",
                format!("\"{license}\" is not a known SPDX license id"),
            )),
        },
        None if !is_model => issues.push(FieldError::note(
            "license",
            "no license given; consider adding an SPDX license id",
        )),
        None => {}
    }

    check_authors("authors", base.authors(), issues);
    for (i, maintainer) in base.maintainers().iter().enumerate() {
        if let Some(orcid) = &maintainer.orcid {
            if !orcid.checksum_valid() {
                issues.push(FieldError::structural(
                    format!("maintainers.{i}.orcid"),
                    format!("invalid ORCID checksum in \"{}\"", orcid.as_str()),
                ));
            }
        }
    }

    if let Some(documentation) = base.documentation() {
        check_suffix("documentation", documentation, DOCUMENTATION_SUFFIXES, issues);
    }
    for (i, cover) in base.covers().iter().enumerate() {
        check_suffix(&child_path("covers", i), cover, COVER_SUFFIXES, issues);
    }
    if let Some(Icon::File(icon)) = base.icon() {
        check_suffix("icon", icon, COVER_SUFFIXES, issues);
    }

    check_http_url("git_repo", base.git_repo(), issues);
    for (i, badge) in base.badges().iter().enumerate() {
        check_http_url(&format!("badges.{i}.url"), Some(&badge.url), issues);
    }
    for (i, cite) in base.cite().iter().enumerate() {
        check_http_url(&format!("cite.{i}.url"), cite.url.as_ref(), issues);
    }
}

fn check_authors(field: &str, authors: &[Author], issues: &mut Vec<FieldError>) {
    for (i, author) in authors.iter().enumerate() {
        if let Some(orcid) = &author.orcid {
            if !orcid.checksum_valid() {
                issues.push(FieldError::structural(
                    format!("{field}.{i}.orcid"),
                    format!("invalid ORCID checksum in \"{}\"", orcid.as_str()),
                ));
            }
        }
    }
}

/// Every packaged URL must parse.
fn check_urls(descr: &ResourceDescr, issues: &mut Vec<FieldError>) {
    for file in packaged_files(descr) {
        if let Some(Err(e)) = file.source.url() {
            issues.push(FieldError::structural(
                file.path,
                format!("invalid URL \"{}\": {e}", file.source),
            ));
        }
    }
}

fn check_http_url(path: &str, url: Option<&HttpUrl>, issues: &mut Vec<FieldError>) {
    if let Some(url) = url {
        if let Err(e) = url.parse() {
            issues.push(FieldError::structural(
                path,
                format!("invalid URL \"{}\": {e}", url.as_str()),
            ));
        }
    }
}

fn check_suffix(path: &str, source: &FileSource, suffixes: &[&str], issues: &mut Vec<FieldError>) {
    if !source.has_suffix(suffixes) {
        issues.push(FieldError::structural(
            path,
            format!(
                "\"{source}\" must end in one of: {}",
                suffixes.join(", ")
            ),
        ));
    }
}

/// Percentile bounds and order, on a 0..=100 scale.
pub fn check_percentiles(min_percentile: f64, max_percentile: f64) -> Result<(), String> {
    if !(0.0..100.0).contains(&min_percentile) {
        return Err(format!(
            "min_percentile {min_percentile} must be in [0, 100)"
        ));
    }
    if !(max_percentile > 1.0 && max_percentile <= 100.0) {
        return Err(format!(
            "max_percentile {max_percentile} must be in (1, 100]; percentiles are on a 0..100 scale"
        ));
    }
    if min_percentile >= max_percentile {
        return Err(format!(
            "min_percentile {min_percentile} must be less than max_percentile {max_percentile}"
        ));
    }
    Ok(())
}

fn check_eps(eps: f64) -> Result<(), String> {
    if eps > 0.0 && eps <= 0.1 {
        Ok(())
    } else {
        Err(format!("eps {eps} must be in (0, 0.1]"))
    }
}

fn check_timestamp(timestamp: &str, issues: &mut Vec<FieldError>) {
    if !is_iso_timestamp(timestamp) {
        issues.push(FieldError::structural(
            "timestamp",
            format!("\"{timestamp}\" is not an ISO 8601 date or date-time"),
        ));
    }
}

/// An ISO 8601 date, local date-time or RFC 3339 date-time.
fn is_iso_timestamp(value: &str) -> bool {
    const DATE_TIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || DATE_TIME_FORMATS
            .iter()
            .any(|format| NaiveDateTime::parse_from_str(value, format).is_ok())
}

fn check_range(path: &str, range: (Option<f64>, Option<f64>), issues: &mut Vec<FieldError>) {
    if let (Some(min), Some(max)) = range {
        if min > max {
            issues.push(FieldError::cross_field(
                path,
                format!("range minimum {min} is greater than maximum {max}"),
            ));
        }
    }
}

/// Data-dependent bounds must be ordered and a halo must leave part of a
/// known minimum size.
fn check_output_axes(path: &str, axes: &[AxisDescr], issues: &mut Vec<FieldError>) {
    for (j, axis) in axes.iter().enumerate() {
        let min_size = match axis.size_spec() {
            SizeSpec::DataDependent(size) => {
                if let Some(max) = size.max.filter(|max| *max < size.min) {
                    issues.push(FieldError::cross_field(
                        format!("{path}.axes.{j}.size"),
                        format!(
                            "data dependent size minimum {} is greater than maximum {max}",
                            size.min
                        ),
                    ));
                }
                Some(size.min)
            }
            SizeSpec::Fixed(n) => Some(n),
            SizeSpec::Parameterized(p) => Some(p.min),
            SizeSpec::Batch | SizeSpec::Reference(_) => None,
        };
        if let (Some(halo), Some(size)) = (axis.halo(), min_size) {
            if halo.saturating_mul(2) >= size {
                issues.push(FieldError::cross_field(
                    format!("{path}.axes.{j}.halo"),
                    format!(
                        "halo {halo} of {} axis '{}' leaves nothing of size {size}",
                        axis.type_name(),
                        axis.id()
                    ),
                ));
            }
        }
    }
}

fn check_step(path: &str, step: &ProcessingStep, issues: &mut Vec<FieldError>) {
    let mut fail = |field: &str, message: String| {
        issues.push(FieldError::cross_field(child_path(path, field), message));
    };

    match step {
        ProcessingStep::Clip(kwargs) if kwargs.min >= kwargs.max => fail(
            "kwargs",
            format!("clip min {} must be less than max {}", kwargs.min, kwargs.max),
        ),
        ProcessingStep::Binarize(BinarizeKwargs::AlongAxis { threshold, .. })
            if threshold.is_empty() =>
        {
            fail("kwargs.threshold", "threshold list must not be empty".into())
        }
        ProcessingStep::ScaleLinear(ScaleLinearKwargs::AlongAxis { gain, offset, .. }) => {
            if gain.is_empty() && offset.is_empty() {
                fail(
                    "kwargs",
                    "scale_linear along an axis needs a gain or an offset list".into(),
                );
            } else if !gain.is_empty() && !offset.is_empty() && gain.len() != offset.len() {
                fail(
                    "kwargs.offset",
                    format!(
                        "offset has {} entries but gain has {}",
                        offset.len(),
                        gain.len()
                    ),
                );
            }
        }
        ProcessingStep::FixedZeroMeanUnitVariance(kwargs) => match kwargs {
            FixedZeroMeanUnitVarianceKwargs::AlongAxis { mean, std, .. } => {
                if mean.is_empty() {
                    fail("kwargs.mean", "mean list must not be empty".into());
                } else if mean.len() != std.len() {
                    fail(
                        "kwargs.std",
                        format!("std has {} entries but mean has {}", std.len(), mean.len()),
                    );
                }
                if let Some(i) = std.iter().position(|s| *s <= 0.0) {
                    fail(&format!("kwargs.std.{i}"), "std must be positive".into());
                }
            }
            FixedZeroMeanUnitVarianceKwargs::Single { std, .. } if *std <= 0.0 => {
                fail("kwargs.std", format!("std {std} must be positive"));
            }
            FixedZeroMeanUnitVarianceKwargs::Single { .. } => {}
        },
        ProcessingStep::ZeroMeanUnitVariance(kwargs) => {
            if let Err(message) = check_eps(kwargs.eps) {
                fail("kwargs.eps", message);
            }
        }
        ProcessingStep::ScaleRange(kwargs) => {
            if let Err(message) = check_percentiles(kwargs.min_percentile, kwargs.max_percentile) {
                fail("kwargs.max_percentile", message);
            }
            if let Err(message) = check_eps(kwargs.eps) {
                fail("kwargs.eps", message);
            }
        }
        ProcessingStep::ScaleMeanVariance(kwargs) => {
            if let Err(message) = check_eps(kwargs.eps) {
                fail("kwargs.eps", message);
            }
        }
        _ => {}
    }
}

fn check_legacy_step(path: &str, step: &LegacyProcessingStep, issues: &mut Vec<FieldError>) {
    let mut fail = |field: &str, message: String| {
        issues.push(FieldError::cross_field(child_path(path, field), message));
    };
    let list_len = |values: &FloatOrList| match values {
        FloatOrList::Float(_) => None,
        FloatOrList::List(list) => Some(list.len()),
    };

    match step {
        LegacyProcessingStep::Clip(kwargs) if kwargs.min >= kwargs.max => fail(
            "kwargs",
            format!("clip min {} must be less than max {}", kwargs.min, kwargs.max),
        ),
        LegacyProcessingStep::ScaleLinear(kwargs) => {
            if let (Some(gain), Some(offset)) = (list_len(&kwargs.gain), list_len(&kwargs.offset))
            {
                if gain != offset {
                    fail(
                        "kwargs.offset",
                        format!("offset has {offset} entries but gain has {gain}"),
                    );
                }
            }
        }
        LegacyProcessingStep::ZeroMeanUnitVariance(kwargs) => {
            if kwargs.mode == ProcessingMode::Fixed {
                match (&kwargs.mean, &kwargs.std) {
                    (Some(mean), Some(std)) => {
                        if let (Some(m), Some(s)) = (list_len(mean), list_len(std)) {
                            if m != s {
                                fail(
                                    "kwargs.std",
                                    format!("std has {s} entries but mean has {m}"),
                                );
                            }
                        }
                        if std.values().iter().any(|s| *s <= 0.0) {
                            fail("kwargs.std", "std must be positive".into());
                        }
                    }
                    _ => fail(
                        "kwargs",
                        "mode `fixed` requires both mean and std".into(),
                    ),
                }
            }
            if let Err(message) = check_eps(kwargs.eps) {
                fail("kwargs.eps", message);
            }
        }
        LegacyProcessingStep::ScaleRange(kwargs) => {
            if let Err(message) = check_percentiles(kwargs.min_percentile, kwargs.max_percentile) {
                fail("kwargs.max_percentile", message);
            }
            if let Err(message) = check_eps(kwargs.eps) {
                fail("kwargs.eps", message);
            }
        }
        LegacyProcessingStep::ScaleMeanVariance(kwargs) => {
            if let Err(message) = check_eps(kwargs.eps) {
                fail("kwargs.eps", message);
            }
        }
        _ => {}
    }
}

fn check_model_common(
    covers_empty: bool,
    timestamp: &str,
    packaged_by: &[Author],
    weights_empty: bool,
    issues: &mut Vec<FieldError>,
) {
    if covers_empty {
        issues.push(FieldError::note(
            "covers",
            "no cover images; models should show at least one cover",
        ));
    }
    check_timestamp(timestamp, issues);
    check_authors("packaged_by", packaged_by, issues);
    if weights_empty {
        issues.push(FieldError::structural(
            "weights",
            "at least one weights entry is required",
        ));
    }
}

fn check_model_v0_5(model: &ModelDescrV0_5, issues: &mut Vec<FieldError>) {
    check_model_common(
        model.base.covers.is_empty(),
        &model.timestamp,
        &model.packaged_by,
        model.weights.is_empty(),
        issues,
    );

    if model.base.name.chars().count() > MODEL_NAME_SOFT_LIMIT {
        issues.push(FieldError::note(
            "name",
            format!("name is longer than {MODEL_NAME_SOFT_LIMIT} characters"),
        ));
    }

    let tensors = model
        .inputs
        .iter()
        .enumerate()
        .map(|(i, t)| (format!("inputs.{i}"), &t.test_tensor, t.sample_tensor.as_ref(), &t.data))
        .chain(model.outputs.iter().enumerate().map(|(i, t)| {
            (
                format!("outputs.{i}"),
                &t.test_tensor,
                t.sample_tensor.as_ref(),
                &t.data,
            )
        }));
    for (path, test_tensor, sample_tensor, data) in tensors {
        check_suffix(
            &format!("{path}.test_tensor.source"),
            &test_tensor.source,
            TEST_TENSOR_SUFFIXES,
            issues,
        );
        if let Some(sample) = sample_tensor {
            check_suffix(
                &format!("{path}.sample_tensor.source"),
                &sample.source,
                SAMPLE_TENSOR_SUFFIXES,
                issues,
            );
        }
        if let TensorDataDescr::IntervalOrRatio(data) = data {
            check_range(&format!("{path}.data.range"), data.range, issues);
        }
    }

    for (i, input) in model.inputs.iter().enumerate() {
        for (k, step) in input.preprocessing.iter().enumerate() {
            check_step(&format!("inputs.{i}.preprocessing.{k}"), step, issues);
        }
    }
    for (i, output) in model.outputs.iter().enumerate() {
        check_output_axes(&format!("outputs.{i}"), &output.axes, issues);
        for (k, step) in output.postprocessing.iter().enumerate() {
            check_step(&format!("outputs.{i}.postprocessing.{k}"), step, issues);
        }
    }

    if let Some(pytorch) = &model.weights.pytorch_state_dict {
        if let ArchitectureDescr::FromFile { source, .. } = &pytorch.architecture {
            check_suffix(
                "weights.pytorch_state_dict.architecture.source",
                source,
                ARCHITECTURE_SUFFIXES,
                issues,
            );
        }
        if let Some(dependencies) = &pytorch.dependencies {
            check_suffix(
                "weights.pytorch_state_dict.dependencies.source",
                &dependencies.source,
                ENVIRONMENT_SUFFIXES,
                issues,
            );
        }
    }
    if let Some(bundle) = &model.weights.tensorflow_saved_model_bundle {
        if let Some(dependencies) = &bundle.dependencies {
            check_suffix(
                "weights.tensorflow_saved_model_bundle.dependencies.source",
                &dependencies.source,
                ENVIRONMENT_SUFFIXES,
                issues,
            );
        }
    }
}

fn check_model_v0_4(model: &ModelDescrV0_4, issues: &mut Vec<FieldError>) {
    check_model_common(
        model.base.covers.is_empty(),
        &model.timestamp,
        &model.packaged_by,
        model.weights.is_empty(),
        issues,
    );

    for (field, sources, suffixes) in [
        ("test_inputs", &model.test_inputs, TEST_TENSOR_SUFFIXES),
        ("test_outputs", &model.test_outputs, TEST_TENSOR_SUFFIXES),
        ("sample_inputs", &model.sample_inputs, SAMPLE_TENSOR_SUFFIXES),
        ("sample_outputs", &model.sample_outputs, SAMPLE_TENSOR_SUFFIXES),
    ] {
        for (i, source) in sources.iter().enumerate() {
            check_suffix(&child_path(field, i), source, suffixes, issues);
        }
    }

    for (i, input) in model.inputs.iter().enumerate() {
        if let Some(range) = input.data_range {
            check_range(&format!("inputs.{i}.data_range"), range, issues);
        }
        for (k, step) in input.preprocessing.iter().enumerate() {
            check_legacy_step(&format!("inputs.{i}.preprocessing.{k}"), step, issues);
        }
    }
    for (i, output) in model.outputs.iter().enumerate() {
        if let Some(range) = output.data_range {
            check_range(&format!("outputs.{i}.data_range"), range, issues);
        }
        for (k, step) in output.postprocessing.iter().enumerate() {
            check_legacy_step(&format!("outputs.{i}.postprocessing.{k}"), step, issues);
        }
    }

    if let Some(pytorch) = &model.weights.pytorch_state_dict {
        if let Some((file, _)) = pytorch.architecture.from_file() {
            if !ARCHITECTURE_SUFFIXES
                .iter()
                .any(|suffix| file.to_lowercase().ends_with(suffix))
            {
                issues.push(FieldError::structural(
                    "weights.pytorch_state_dict.architecture",
                    format!("architecture file \"{file}\" must be a .py file"),
                ));
            }
            if pytorch.architecture_sha256.is_none() {
                issues.push(FieldError::note(
                    "weights.pytorch_state_dict.architecture_sha256",
                    "architecture_sha256 is recommended for architectures loaded from a file",
                ));
            }
        }
    }

    for (format, dependencies) in model.weights.dependencies() {
        if let Some(("conda", file)) = dependencies.split() {
            if !ENVIRONMENT_SUFFIXES
                .iter()
                .any(|suffix| file.to_lowercase().ends_with(suffix))
            {
                issues.push(FieldError::structural(
                    format!("weights.{format}.dependencies"),
                    format!("conda environment \"{file}\" must be a .yaml or .yml file"),
                ));
            }
        }
    }
}
