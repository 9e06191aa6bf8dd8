//! Cross-field checks.
//!
//! Axis size references are resolved in two passes: every axis of every
//! tensor is indexed by `(tensor_id, axis_id)`, then each reference is
//! followed depth first with a visiting set so cycles are reported instead
//! of recursed into. The same module checks tensor references from
//! processing steps, v0.4 shape lengths, the weights derivation graph and
//! id uniqueness.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::axes::{AxisDescr, DataDependentSize, LegacyAxes, ParameterizedSize, SizeSpec};
use crate::descr::{CollectionDescr, ResourceDescr};
use crate::error::{child_path, FieldError};
use crate::fields::{AxisId, TensorId};
use crate::model::{tensor_kinds, ModelDescr, ModelDescrV0_4, ModelDescrV0_5};
use crate::processing::ProcessingMode;
use crate::tensor::{InputShapeV0_4, OutputShapeV0_4};
use crate::weights::{WeightsEntryBase, WeightsFormat};

/// A v0.5 axis size with references followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedSize {
    /// Batch axes have no declared size.
    Batch,
    Fixed(u64),
    Parameterized(ParameterizedSize),
    DataDependent(DataDependentSize),
}

/// Resolved size of every axis of `model`, keyed by `(tensor_id, axis_id)`.
///
/// # Errors
///
/// Returns one error per axis whose size references an unknown axis, a
/// batch axis, takes part in a reference cycle, or resolves below 1.
pub fn resolve_axis_sizes(
    model: &ModelDescrV0_5,
) -> Result<BTreeMap<(TensorId, AxisId), ResolvedSize>, Vec<FieldError>> {
    let mut resolver = SizeResolver::new(model);
    let mut sizes = BTreeMap::new();
    let mut errors = Vec::new();

    for (path, tensor_id, axes) in tensor_axes(model) {
        for (j, axis) in axes.iter().enumerate() {
            match resolver.resolve((tensor_id.as_str(), axis.id().as_str())) {
                Ok(size) => {
                    sizes
                        .entry((tensor_id.clone(), axis.id().clone()))
                        .or_insert(size);
                }
                Err(e) => errors.push(FieldError::cross_field(
                    format!("{path}.axes.{j}.size"),
                    e.to_string(),
                )),
            }
        }
    }

    if errors.is_empty() {
        Ok(sizes)
    } else {
        Err(errors)
    }
}

type AxisKey<'a> = (&'a str, &'a str);

#[derive(Debug, Clone, PartialEq, Eq)]
enum SizeError {
    Unknown { tensor_id: String, axis_id: String },
    Batch { tensor_id: String, axis_id: String },
    Cycle,
    TooSmall(i128),
}

impl std::fmt::Display for SizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeError::Unknown { tensor_id, axis_id } => {
                write!(f, "size references unknown axis '{axis_id}' of tensor '{tensor_id}'")
            }
            SizeError::Batch { tensor_id, axis_id } => write!(
                f,
                "size references batch axis '{axis_id}' of tensor '{tensor_id}'"
            ),
            SizeError::Cycle => write!(f, "size reference forms a cycle"),
            SizeError::TooSmall(size) => write!(f, "resolved size {size} is less than 1"),
        }
    }
}

struct SizeResolver<'a> {
    axes: HashMap<AxisKey<'a>, &'a AxisDescr>,
    resolved: HashMap<AxisKey<'a>, Result<ResolvedSize, SizeError>>,
    visiting: HashSet<AxisKey<'a>>,
}

impl<'a> SizeResolver<'a> {
    fn new(model: &'a ModelDescrV0_5) -> Self {
        let mut axes = HashMap::new();
        for (_, tensor_id, tensor_axes) in tensor_axes(model) {
            for axis in tensor_axes {
                axes.entry((tensor_id.as_str(), axis.id().as_str()))
                    .or_insert(axis);
            }
        }
        Self {
            axes,
            resolved: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    fn resolve(&mut self, key: AxisKey<'a>) -> Result<ResolvedSize, SizeError> {
        if let Some(done) = self.resolved.get(&key) {
            return done.clone();
        }
        if !self.visiting.insert(key) {
            return Err(SizeError::Cycle);
        }
        let result = self.resolve_uncached(key);
        self.visiting.remove(&key);
        self.resolved.insert(key, result.clone());
        result
    }

    fn resolve_uncached(&mut self, key: AxisKey<'a>) -> Result<ResolvedSize, SizeError> {
        let Some(axis) = self.axes.get(&key).copied() else {
            return Err(SizeError::Unknown {
                tensor_id: key.0.to_string(),
                axis_id: key.1.to_string(),
            });
        };
        let reference = match axis.size_spec() {
            SizeSpec::Batch => return Ok(ResolvedSize::Batch),
            SizeSpec::Fixed(n) => return Ok(ResolvedSize::Fixed(n)),
            SizeSpec::Parameterized(p) => return Ok(ResolvedSize::Parameterized(p)),
            SizeSpec::DataDependent(d) => return Ok(ResolvedSize::DataDependent(d)),
            SizeSpec::Reference(reference) => reference,
        };

        let target = (reference.tensor_id.as_str(), reference.axis_id.as_str());
        let offset = reference.offset;
        match self.resolve(target)? {
            ResolvedSize::Batch => Err(SizeError::Batch {
                tensor_id: target.0.to_string(),
                axis_id: target.1.to_string(),
            }),
            ResolvedSize::Fixed(n) => shift(n, offset).map(ResolvedSize::Fixed),
            ResolvedSize::Parameterized(p) => Ok(ResolvedSize::Parameterized(ParameterizedSize {
                min: shift(p.min, offset)?,
                step: p.step,
            })),
            ResolvedSize::DataDependent(d) => Ok(ResolvedSize::DataDependent(DataDependentSize {
                min: d.min.saturating_add_signed(offset),
                max: d.max.map(|max| max.saturating_add_signed(offset)),
            })),
        }
    }
}

/// `size + offset`, which must stay at least 1.
fn shift(size: u64, offset: i64) -> Result<u64, SizeError> {
    let shifted = i128::from(size) + i128::from(offset);
    if shifted < 1 {
        return Err(SizeError::TooSmall(shifted));
    }
    u64::try_from(shifted).map_err(|_| SizeError::TooSmall(shifted))
}

fn tensor_axes(model: &ModelDescrV0_5) -> Vec<(String, &TensorId, &[AxisDescr])> {
    let inputs = model
        .inputs
        .iter()
        .enumerate()
        .map(|(i, t)| (format!("inputs.{i}"), &t.id, t.axes.as_slice()));
    let outputs = model
        .outputs
        .iter()
        .enumerate()
        .map(|(i, t)| (format!("outputs.{i}"), &t.id, t.axes.as_slice()));
    inputs.chain(outputs).collect()
}

/// Run all cross-field checks.
pub(crate) fn check(descr: &ResourceDescr) -> Vec<FieldError> {
    let mut errors = Vec::new();
    match descr {
        ResourceDescr::Model(ModelDescr::V0_5(model)) => check_model_v0_5(model, &mut errors),
        ResourceDescr::Model(ModelDescr::V0_4(model)) => check_model_v0_4(model, &mut errors),
        ResourceDescr::Collection(CollectionDescr::V0_2(collection)) => check_unique_entry_ids(
            collection.collection.iter().map(|entry| entry.id.as_deref()),
            &mut errors,
        ),
        ResourceDescr::Collection(CollectionDescr::V0_3(collection)) => check_unique_entry_ids(
            collection.collection.iter().map(|entry| entry.id.as_deref()),
            &mut errors,
        ),
        _ => {}
    }
    errors
}

fn check_unique_entry_ids<'a>(
    ids: impl Iterator<Item = Option<&'a str>>,
    errors: &mut Vec<FieldError>,
) {
    let mut seen = HashSet::new();
    for (i, id) in ids.enumerate() {
        if let Some(id) = id {
            if !seen.insert(id) {
                errors.push(FieldError::cross_field(
                    format!("collection.{i}.id"),
                    format!("duplicate collection entry id '{id}'"),
                ));
            }
        }
    }
}

/// Whether a tensor is a model input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TensorKind {
    Input,
    Output,
}

/// A step's `reference_tensor` as seen from its owning tensor.
struct TensorReference<'a> {
    path: String,
    owner: &'a str,
    target: &'a str,
    postprocessing: bool,
    mode: Option<ProcessingMode>,
}

/// Reference-tensor scoping shared by both model versions.
///
/// The referenced tensor must exist. Inputs may always be referenced; an
/// output, including the step's own tensor, may only be referenced from a
/// postprocessing step with mode `per_dataset`. References between distinct
/// tensors must not form a cycle.
fn check_tensor_references(
    kinds: &HashMap<&str, TensorKind>,
    references: &[TensorReference<'_>],
    errors: &mut Vec<FieldError>,
) {
    let mut edges: Vec<(&str, &str, &str)> = Vec::new();
    for reference in references {
        let path = child_path(&reference.path, "kwargs.reference_tensor");
        let Some(kind) = kinds.get(reference.target) else {
            errors.push(FieldError::cross_field(
                path,
                format!("unknown reference tensor '{}'", reference.target),
            ));
            continue;
        };
        if *kind == TensorKind::Output {
            if !reference.postprocessing {
                errors.push(FieldError::cross_field(
                    path,
                    format!(
                        "preprocessing cannot reference output tensor '{}'",
                        reference.target
                    ),
                ));
                continue;
            }
            if reference.mode != Some(ProcessingMode::PerDataset) {
                errors.push(FieldError::cross_field(
                    path,
                    format!(
                        "output tensor '{}' may only be referenced with mode `{}`, got `{}`",
                        reference.target,
                        ProcessingMode::PerDataset.as_str(),
                        reference.mode.map_or("unset", |mode| mode.as_str()),
                    ),
                ));
                continue;
            }
        }
        if reference.target == reference.owner {
            continue;
        }
        edges.push((reference.owner, reference.target, reference.path.as_str()));
    }

    for (owner, target, step_path) in &edges {
        if reaches(&edges, target, owner) {
            errors.push(FieldError::cross_field(
                child_path(step_path, "kwargs.reference_tensor"),
                format!("reference from '{owner}' to '{target}' forms a cycle"),
            ));
        }
    }
}

fn reaches(edges: &[(&str, &str, &str)], from: &str, to: &str) -> bool {
    let mut stack = vec![from];
    let mut seen = HashSet::new();
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if seen.insert(node) {
            stack.extend(
                edges
                    .iter()
                    .filter(|(owner, _, _)| *owner == node)
                    .map(|(_, target, _)| *target),
            );
        }
    }
    false
}

fn check_unique_tensor_ids<'a>(
    ids: impl Iterator<Item = (String, &'a str)>,
    errors: &mut Vec<FieldError>,
) {
    let mut seen = HashSet::new();
    for (path, id) in ids {
        if !seen.insert(id) {
            errors.push(FieldError::cross_field(
                path,
                format!("duplicate tensor id '{id}'"),
            ));
        }
    }
}

fn check_model_v0_5(model: &ModelDescrV0_5, errors: &mut Vec<FieldError>) {
    check_unique_tensor_ids(
        tensor_kinds(model)
            .into_iter()
            .map(|(field, i, id)| (format!("{field}.{i}.id"), id)),
        errors,
    );

    for (path, _, axes) in tensor_axes(model) {
        let mut seen = HashSet::new();
        for (j, axis) in axes.iter().enumerate() {
            if !seen.insert(axis.id().as_str()) {
                errors.push(FieldError::cross_field(
                    format!("{path}.axes.{j}.id"),
                    format!("duplicate axis id '{}'", axis.id()),
                ));
            }
        }
    }

    if let Err(mut size_errors) = resolve_axis_sizes(model) {
        errors.append(&mut size_errors);
    }

    let steps = model
        .inputs
        .iter()
        .enumerate()
        .flat_map(|(i, t)| {
            t.preprocessing.iter().enumerate().map(move |(k, step)| {
                (format!("inputs.{i}.preprocessing.{k}"), t.id.as_str(), &t.axes, step, false)
            })
        })
        .chain(model.outputs.iter().enumerate().flat_map(|(i, t)| {
            t.postprocessing.iter().enumerate().map(move |(k, step)| {
                (format!("outputs.{i}.postprocessing.{k}"), t.id.as_str(), &t.axes, step, true)
            })
        }));

    let mut references = Vec::new();
    for (path, owner, axes, step, postprocessing) in steps {
        for (field, axis_id) in step.axis_refs() {
            if !axes.iter().any(|axis| axis.id() == axis_id) {
                errors.push(FieldError::cross_field(
                    child_path(&path, field),
                    format!("'{axis_id}' is not an axis of tensor '{owner}'"),
                ));
            }
        }
        if let Some(target) = step.reference_tensor() {
            references.push(TensorReference {
                path,
                owner,
                target: target.as_str(),
                postprocessing,
                mode: step.mode(),
            });
        }
    }

    let kinds: HashMap<&str, TensorKind> = tensor_kinds(model)
        .into_iter()
        .rev()
        .map(|(field, _, id)| {
            let kind = if field == "inputs" {
                TensorKind::Input
            } else {
                TensorKind::Output
            };
            (id, kind)
        })
        .collect();
    check_tensor_references(&kinds, &references, errors);

    check_weights_graph(&model.weights.entries(), errors);
}

fn check_model_v0_4(model: &ModelDescrV0_4, errors: &mut Vec<FieldError>) {
    let ids = model
        .inputs
        .iter()
        .enumerate()
        .map(|(i, t)| (format!("inputs.{i}.name"), t.name.as_str()))
        .chain(
            model
                .outputs
                .iter()
                .enumerate()
                .map(|(i, t)| (format!("outputs.{i}.name"), t.name.as_str())),
        );
    check_unique_tensor_ids(ids, errors);

    let mut kinds = HashMap::new();
    for output in model.outputs.iter().rev() {
        kinds.insert(output.name.as_str(), TensorKind::Output);
    }
    for input in model.inputs.iter().rev() {
        kinds.insert(input.name.as_str(), TensorKind::Input);
    }

    let mut references = Vec::new();
    for (i, input) in model.inputs.iter().enumerate() {
        let path = format!("inputs.{i}");
        check_legacy_axes(&path, &input.axes, errors);
        let lengths = match &input.shape {
            InputShapeV0_4::Explicit(shape) => vec![("shape", shape.len())],
            InputShapeV0_4::Parameterized { min, step } => {
                vec![("shape.min", min.len()), ("shape.step", step.len())]
            }
        };
        check_lengths(&path, &input.axes, &lengths, errors);

        for (k, step) in input.preprocessing.iter().enumerate() {
            let step_path = format!("{path}.preprocessing.{k}");
            check_legacy_step_axes(&step_path, step.axes(), &input.axes, errors);
            if let Some(target) = step.reference_tensor() {
                references.push(TensorReference {
                    path: step_path,
                    owner: input.name.as_str(),
                    target: target.as_str(),
                    postprocessing: false,
                    mode: step.mode(),
                });
            }
        }
    }

    for (i, output) in model.outputs.iter().enumerate() {
        let path = format!("outputs.{i}");
        check_legacy_axes(&path, &output.axes, errors);
        let mut lengths = match &output.shape {
            OutputShapeV0_4::Explicit(shape) => vec![("shape", shape.len())],
            OutputShapeV0_4::Implicit {
                reference_tensor,
                scale,
                offset,
            } => {
                if kinds.get(reference_tensor.as_str()) != Some(&TensorKind::Input) {
                    errors.push(FieldError::cross_field(
                        format!("{path}.shape.reference_tensor"),
                        format!("'{reference_tensor}' is not an input tensor"),
                    ));
                }
                vec![("shape.scale", scale.len()), ("shape.offset", offset.len())]
            }
        };
        if let Some(halo) = &output.halo {
            lengths.push(("halo", halo.len()));
        }
        check_lengths(&path, &output.axes, &lengths, errors);

        for (k, step) in output.postprocessing.iter().enumerate() {
            let step_path = format!("{path}.postprocessing.{k}");
            check_legacy_step_axes(&step_path, step.axes(), &output.axes, errors);
            if let Some(target) = step.reference_tensor() {
                references.push(TensorReference {
                    path: step_path,
                    owner: output.name.as_str(),
                    target: target.as_str(),
                    postprocessing: true,
                    mode: step.mode(),
                });
            }
        }
    }
    check_tensor_references(&kinds, &references, errors);

    for (field, files, tensors) in [
        ("test_inputs", model.test_inputs.len(), model.inputs.len()),
        ("test_outputs", model.test_outputs.len(), model.outputs.len()),
    ] {
        if files != tensors {
            errors.push(FieldError::cross_field(
                field,
                format!("{files} test tensors given for {tensors} tensors"),
            ));
        }
    }

    check_weights_graph(&model.weights.entries(), errors);
}

fn check_legacy_axes(path: &str, axes: &LegacyAxes, errors: &mut Vec<FieldError>) {
    for letter in axes.repeated() {
        errors.push(FieldError::cross_field(
            child_path(path, "axes"),
            format!("axis '{letter}' appears more than once in '{axes}'"),
        ));
    }
}

fn check_lengths(
    path: &str,
    axes: &LegacyAxes,
    lengths: &[(&str, usize)],
    errors: &mut Vec<FieldError>,
) {
    for (field, len) in lengths {
        if *len != axes.len() {
            errors.push(FieldError::cross_field(
                child_path(path, field),
                format!("has {len} entries but axes '{axes}' has {}", axes.len()),
            ));
        }
    }
}

fn check_legacy_step_axes(
    path: &str,
    step_axes: Option<&LegacyAxes>,
    tensor_axes: &LegacyAxes,
    errors: &mut Vec<FieldError>,
) {
    let Some(step_axes) = step_axes else {
        return;
    };
    if let Some(letter) = step_axes
        .letters()
        .iter()
        .find(|letter| !tensor_axes.contains(**letter))
    {
        errors.push(FieldError::cross_field(
            child_path(path, "kwargs.axes"),
            format!("axis '{letter}' is not in the tensor's axes '{tensor_axes}'"),
        ));
    }
}

/// With more than one entry: exactly one root, parents present, no cycles.
fn check_weights_graph(entries: &[(WeightsFormat, &WeightsEntryBase)], errors: &mut Vec<FieldError>) {
    if entries.len() <= 1 {
        return;
    }

    let parents: BTreeMap<WeightsFormat, Option<WeightsFormat>> = entries
        .iter()
        .map(|(format, entry)| (*format, entry.parent))
        .collect();

    let roots = parents.values().filter(|parent| parent.is_none()).count();
    if roots != 1 {
        errors.push(FieldError::cross_field(
            "weights",
            format!("exactly one weights entry must have no parent, found {roots}"),
        ));
    }

    for (format, parent) in &parents {
        let Some(parent) = parent else {
            continue;
        };
        let path = format!("weights.{format}.parent");
        if !parents.contains_key(parent) {
            errors.push(FieldError::cross_field(
                path,
                format!("parent '{parent}' is not one of the given weights"),
            ));
            continue;
        }

        let mut current = Some(*parent);
        let mut steps = 0;
        while let Some(format_now) = current {
            if format_now == *format {
                errors.push(FieldError::cross_field(
                    path.clone(),
                    format!("'{format}' is its own ancestor"),
                ));
                break;
            }
            steps += 1;
            if steps > parents.len() {
                break;
            }
            current = parents.get(&format_now).copied().flatten();
        }
    }
}
