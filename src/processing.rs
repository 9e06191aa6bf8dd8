//! Pre- and postprocessing steps.
//!
//! v0.5 steps are keyed by `id`, v0.4 steps by `name`; both carry their
//! parameters in `kwargs`. Steps deserialize through a raw `{tag, kwargs}`
//! record so that the tag selects the kwargs type and a missing `kwargs`
//! means "all defaults".

use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::axes::LegacyAxes;
use crate::error::child_path;
use crate::fields::{AxisId, TensorId};
use crate::tensor::DataType;

/// v0.5 step ids allowed in `preprocessing`.
pub const PREPROCESSING_STEP_IDS: &[&str] = &[
    "binarize",
    "clip",
    "ensure_dtype",
    "scale_linear",
    "sigmoid",
    "softmax",
    "fixed_zero_mean_unit_variance",
    "zero_mean_unit_variance",
    "scale_range",
];

/// v0.5 step ids allowed in `postprocessing`.
pub const POSTPROCESSING_STEP_IDS: &[&str] = &[
    "binarize",
    "clip",
    "ensure_dtype",
    "scale_linear",
    "sigmoid",
    "softmax",
    "fixed_zero_mean_unit_variance",
    "zero_mean_unit_variance",
    "scale_range",
    "scale_mean_variance",
];

pub const LEGACY_PREPROCESSING_STEP_NAMES: &[&str] = &[
    "binarize",
    "clip",
    "scale_linear",
    "sigmoid",
    "zero_mean_unit_variance",
    "scale_range",
];

pub const LEGACY_POSTPROCESSING_STEP_NAMES: &[&str] = &[
    "binarize",
    "clip",
    "scale_linear",
    "sigmoid",
    "zero_mean_unit_variance",
    "scale_range",
    "scale_mean_variance",
];

pub const DEFAULT_EPS: f64 = 1e-6;

fn default_eps() -> f64 {
    DEFAULT_EPS
}

fn default_max_percentile() -> f64 {
    100.0
}

fn default_gain() -> f64 {
    1.0
}

fn default_channel_axis() -> AxisId {
    AxisId::from_static("channel")
}

/// Which statistics a normalization step uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Statistics given in the kwargs.
    Fixed,
    /// Statistics of the whole dataset.
    PerDataset,
    /// Statistics of each sample.
    #[default]
    PerSample,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Fixed => "fixed",
            ProcessingMode::PerDataset => "per_dataset",
            ProcessingMode::PerSample => "per_sample",
        }
    }
}

/// A scalar or one value per entry along an axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FloatOrList {
    Float(f64),
    List(Vec<f64>),
}

impl FloatOrList {
    pub fn values(&self) -> &[f64] {
        match self {
            FloatOrList::Float(value) => std::slice::from_ref(value),
            FloatOrList::List(values) => values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinarizeKwargs {
    AlongAxis { threshold: Vec<f64>, axis: AxisId },
    Single { threshold: f64 },
}

/// Clip values to `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipKwargs {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsureDtypeKwargs {
    pub dtype: DataType,
}

/// `out = tensor * gain + offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScaleLinearKwargs {
    AlongAxis {
        axis: AxisId,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        gain: Vec<f64>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        offset: Vec<f64>,
    },
    Single {
        #[serde(default = "default_gain")]
        gain: f64,
        #[serde(default)]
        offset: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftmaxKwargs {
    #[serde(default = "default_channel_axis")]
    pub axis: AxisId,
}

/// `out = (tensor - mean) / std` with given statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixedZeroMeanUnitVarianceKwargs {
    AlongAxis {
        mean: Vec<f64>,
        std: Vec<f64>,
        axis: AxisId,
    },
    Single {
        mean: f64,
        std: f64,
    },
}

/// `out = (tensor - mean) / (std + eps)` with per-sample statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroMeanUnitVarianceKwargs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<Vec<AxisId>>,
    #[serde(default = "default_eps")]
    pub eps: f64,
}

impl Default for ZeroMeanUnitVarianceKwargs {
    fn default() -> Self {
        Self {
            axes: None,
            eps: DEFAULT_EPS,
        }
    }
}

/// Scale with percentiles:
/// `out = (tensor - v_lower) / (v_upper - v_lower + eps)`.
///
/// Percentiles are given on a 0..=100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleRangeKwargs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<Vec<AxisId>>,
    #[serde(default)]
    pub min_percentile: f64,
    #[serde(default = "default_max_percentile")]
    pub max_percentile: f64,
    #[serde(default = "default_eps")]
    pub eps: f64,
    /// Tensor whose percentiles are used; defaults to the owning tensor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_tensor: Option<TensorId>,
    #[serde(default)]
    pub mode: ProcessingMode,
}

impl Default for ScaleRangeKwargs {
    fn default() -> Self {
        Self {
            axes: None,
            min_percentile: 0.0,
            max_percentile: 100.0,
            eps: DEFAULT_EPS,
            reference_tensor: None,
            mode: ProcessingMode::PerSample,
        }
    }
}

/// Match mean and variance of `reference_tensor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleMeanVarianceKwargs {
    pub reference_tensor: TensorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<Vec<AxisId>>,
    #[serde(default = "default_eps")]
    pub eps: f64,
    #[serde(default)]
    pub mode: ProcessingMode,
}

#[derive(Deserialize)]
struct RawStep {
    id: String,
    #[serde(default)]
    kwargs: Value,
}

#[derive(Deserialize)]
struct RawLegacyStep {
    name: String,
    #[serde(default)]
    kwargs: Value,
}

fn parse_kwargs<T: DeserializeOwned>(step: &str, kwargs: Value) -> Result<T, String> {
    let kwargs = if kwargs.is_null() {
        Value::Object(Map::new())
    } else {
        kwargs
    };
    serde_json::from_value(kwargs).map_err(|e| format!("invalid kwargs for {step}: {e}"))
}

/// A v0.5 processing step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawStep")]
pub enum ProcessingStep {
    Binarize(BinarizeKwargs),
    Clip(ClipKwargs),
    EnsureDtype(EnsureDtypeKwargs),
    ScaleLinear(ScaleLinearKwargs),
    Sigmoid,
    Softmax(SoftmaxKwargs),
    FixedZeroMeanUnitVariance(FixedZeroMeanUnitVarianceKwargs),
    ZeroMeanUnitVariance(ZeroMeanUnitVarianceKwargs),
    ScaleRange(ScaleRangeKwargs),
    ScaleMeanVariance(ScaleMeanVarianceKwargs),
}

impl TryFrom<RawStep> for ProcessingStep {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let RawStep { id, kwargs } = raw;
        Ok(match id.as_str() {
            "binarize" => ProcessingStep::Binarize(parse_kwargs(&id, kwargs)?),
            "clip" => ProcessingStep::Clip(parse_kwargs(&id, kwargs)?),
            "ensure_dtype" => ProcessingStep::EnsureDtype(parse_kwargs(&id, kwargs)?),
            "scale_linear" => ProcessingStep::ScaleLinear(parse_kwargs(&id, kwargs)?),
            "sigmoid" => ProcessingStep::Sigmoid,
            "softmax" => ProcessingStep::Softmax(parse_kwargs(&id, kwargs)?),
            "fixed_zero_mean_unit_variance" => {
                ProcessingStep::FixedZeroMeanUnitVariance(parse_kwargs(&id, kwargs)?)
            }
            "zero_mean_unit_variance" => {
                ProcessingStep::ZeroMeanUnitVariance(parse_kwargs(&id, kwargs)?)
            }
            "scale_range" => ProcessingStep::ScaleRange(parse_kwargs(&id, kwargs)?),
            "scale_mean_variance" => ProcessingStep::ScaleMeanVariance(parse_kwargs(&id, kwargs)?),
            other => return Err(format!("unknown processing step id \"{other}\"")),
        })
    }
}

impl Serialize for ProcessingStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ProcessingStep", 2)?;
        state.serialize_field("id", self.id())?;
        match self {
            ProcessingStep::Binarize(kwargs) => state.serialize_field("kwargs", kwargs)?,
            ProcessingStep::Clip(kwargs) => state.serialize_field("kwargs", kwargs)?,
            ProcessingStep::EnsureDtype(kwargs) => state.serialize_field("kwargs", kwargs)?,
            ProcessingStep::ScaleLinear(kwargs) => state.serialize_field("kwargs", kwargs)?,
            ProcessingStep::Sigmoid => state.skip_field("kwargs")?,
            ProcessingStep::Softmax(kwargs) => state.serialize_field("kwargs", kwargs)?,
            ProcessingStep::FixedZeroMeanUnitVariance(kwargs) => {
                state.serialize_field("kwargs", kwargs)?
            }
            ProcessingStep::ZeroMeanUnitVariance(kwargs) => {
                state.serialize_field("kwargs", kwargs)?
            }
            ProcessingStep::ScaleRange(kwargs) => state.serialize_field("kwargs", kwargs)?,
            ProcessingStep::ScaleMeanVariance(kwargs) => state.serialize_field("kwargs", kwargs)?,
        }
        state.end()
    }
}

fn indexed_axes<'a>(axes: &'a Option<Vec<AxisId>>) -> Vec<(String, &'a AxisId)> {
    axes.iter()
        .flatten()
        .enumerate()
        .map(|(i, axis)| (child_path("kwargs.axes", i), axis))
        .collect()
}

impl ProcessingStep {
    pub fn ensure_dtype(dtype: DataType) -> Self {
        ProcessingStep::EnsureDtype(EnsureDtypeKwargs { dtype })
    }

    pub fn id(&self) -> &'static str {
        match self {
            ProcessingStep::Binarize(_) => "binarize",
            ProcessingStep::Clip(_) => "clip",
            ProcessingStep::EnsureDtype(_) => "ensure_dtype",
            ProcessingStep::ScaleLinear(_) => "scale_linear",
            ProcessingStep::Sigmoid => "sigmoid",
            ProcessingStep::Softmax(_) => "softmax",
            ProcessingStep::FixedZeroMeanUnitVariance(_) => "fixed_zero_mean_unit_variance",
            ProcessingStep::ZeroMeanUnitVariance(_) => "zero_mean_unit_variance",
            ProcessingStep::ScaleRange(_) => "scale_range",
            ProcessingStep::ScaleMeanVariance(_) => "scale_mean_variance",
        }
    }

    /// The tensor this step takes its statistics from, if it names one.
    pub fn reference_tensor(&self) -> Option<&TensorId> {
        match self {
            ProcessingStep::ScaleRange(kwargs) => kwargs.reference_tensor.as_ref(),
            ProcessingStep::ScaleMeanVariance(kwargs) => Some(&kwargs.reference_tensor),
            _ => None,
        }
    }

    pub fn mode(&self) -> Option<ProcessingMode> {
        match self {
            ProcessingStep::ScaleRange(kwargs) => Some(kwargs.mode),
            ProcessingStep::ScaleMeanVariance(kwargs) => Some(kwargs.mode),
            _ => None,
        }
    }

    /// Axis ids named in the kwargs, with their path relative to the step.
    pub fn axis_refs(&self) -> Vec<(String, &AxisId)> {
        match self {
            ProcessingStep::Binarize(BinarizeKwargs::AlongAxis { axis, .. })
            | ProcessingStep::ScaleLinear(ScaleLinearKwargs::AlongAxis { axis, .. })
            | ProcessingStep::FixedZeroMeanUnitVariance(
                FixedZeroMeanUnitVarianceKwargs::AlongAxis { axis, .. },
            )
            | ProcessingStep::Softmax(SoftmaxKwargs { axis }) => {
                vec![("kwargs.axis".to_string(), axis)]
            }
            ProcessingStep::ZeroMeanUnitVariance(kwargs) => indexed_axes(&kwargs.axes),
            ProcessingStep::ScaleRange(kwargs) => indexed_axes(&kwargs.axes),
            ProcessingStep::ScaleMeanVariance(kwargs) => indexed_axes(&kwargs.axes),
            _ => Vec::new(),
        }
    }
}

/// v0.4 binarize: a single threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegacyBinarizeKwargs {
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyScaleLinearKwargs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<LegacyAxes>,
    #[serde(default = "legacy_default_gain")]
    pub gain: FloatOrList,
    #[serde(default = "legacy_default_offset")]
    pub offset: FloatOrList,
}

fn legacy_default_gain() -> FloatOrList {
    FloatOrList::Float(1.0)
}

fn legacy_default_offset() -> FloatOrList {
    FloatOrList::Float(0.0)
}

fn legacy_default_zmuv_mode() -> ProcessingMode {
    ProcessingMode::Fixed
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyZeroMeanUnitVarianceKwargs {
    #[serde(default = "legacy_default_zmuv_mode")]
    pub mode: ProcessingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<LegacyAxes>,
    /// Required in `fixed` mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<FloatOrList>,
    /// Required in `fixed` mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std: Option<FloatOrList>,
    #[serde(default = "default_eps")]
    pub eps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyScaleRangeKwargs {
    pub mode: ProcessingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<LegacyAxes>,
    #[serde(default)]
    pub min_percentile: f64,
    #[serde(default = "default_max_percentile")]
    pub max_percentile: f64,
    #[serde(default = "default_eps")]
    pub eps: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_tensor: Option<TensorId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyScaleMeanVarianceKwargs {
    pub mode: ProcessingMode,
    pub reference_tensor: TensorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<LegacyAxes>,
    #[serde(default = "default_eps")]
    pub eps: f64,
}

/// A v0.4 processing step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawLegacyStep")]
pub enum LegacyProcessingStep {
    Binarize(LegacyBinarizeKwargs),
    Clip(ClipKwargs),
    ScaleLinear(LegacyScaleLinearKwargs),
    Sigmoid,
    ZeroMeanUnitVariance(LegacyZeroMeanUnitVarianceKwargs),
    ScaleRange(LegacyScaleRangeKwargs),
    ScaleMeanVariance(LegacyScaleMeanVarianceKwargs),
}

impl TryFrom<RawLegacyStep> for LegacyProcessingStep {
    type Error = String;

    fn try_from(raw: RawLegacyStep) -> Result<Self, Self::Error> {
        let RawLegacyStep { name, kwargs } = raw;
        Ok(match name.as_str() {
            "binarize" => LegacyProcessingStep::Binarize(parse_kwargs(&name, kwargs)?),
            "clip" => LegacyProcessingStep::Clip(parse_kwargs(&name, kwargs)?),
            "scale_linear" => LegacyProcessingStep::ScaleLinear(parse_kwargs(&name, kwargs)?),
            "sigmoid" => LegacyProcessingStep::Sigmoid,
            "zero_mean_unit_variance" => {
                LegacyProcessingStep::ZeroMeanUnitVariance(parse_kwargs(&name, kwargs)?)
            }
            "scale_range" => LegacyProcessingStep::ScaleRange(parse_kwargs(&name, kwargs)?),
            "scale_mean_variance" => {
                LegacyProcessingStep::ScaleMeanVariance(parse_kwargs(&name, kwargs)?)
            }
            other => return Err(format!("unknown processing step name \"{other}\"")),
        })
    }
}

impl Serialize for LegacyProcessingStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LegacyProcessingStep", 2)?;
        state.serialize_field("name", self.name())?;
        match self {
            LegacyProcessingStep::Binarize(kwargs) => state.serialize_field("kwargs", kwargs)?,
            LegacyProcessingStep::Clip(kwargs) => state.serialize_field("kwargs", kwargs)?,
            LegacyProcessingStep::ScaleLinear(kwargs) => state.serialize_field("kwargs", kwargs)?,
            LegacyProcessingStep::Sigmoid => state.skip_field("kwargs")?,
            LegacyProcessingStep::ZeroMeanUnitVariance(kwargs) => {
                state.serialize_field("kwargs", kwargs)?
            }
            LegacyProcessingStep::ScaleRange(kwargs) => state.serialize_field("kwargs", kwargs)?,
            LegacyProcessingStep::ScaleMeanVariance(kwargs) => {
                state.serialize_field("kwargs", kwargs)?
            }
        }
        state.end()
    }
}

impl LegacyProcessingStep {
    pub fn name(&self) -> &'static str {
        match self {
            LegacyProcessingStep::Binarize(_) => "binarize",
            LegacyProcessingStep::Clip(_) => "clip",
            LegacyProcessingStep::ScaleLinear(_) => "scale_linear",
            LegacyProcessingStep::Sigmoid => "sigmoid",
            LegacyProcessingStep::ZeroMeanUnitVariance(_) => "zero_mean_unit_variance",
            LegacyProcessingStep::ScaleRange(_) => "scale_range",
            LegacyProcessingStep::ScaleMeanVariance(_) => "scale_mean_variance",
        }
    }

    pub fn reference_tensor(&self) -> Option<&TensorId> {
        match self {
            LegacyProcessingStep::ScaleRange(kwargs) => kwargs.reference_tensor.as_ref(),
            LegacyProcessingStep::ScaleMeanVariance(kwargs) => Some(&kwargs.reference_tensor),
            _ => None,
        }
    }

    pub fn mode(&self) -> Option<ProcessingMode> {
        match self {
            LegacyProcessingStep::ZeroMeanUnitVariance(kwargs) => Some(kwargs.mode),
            LegacyProcessingStep::ScaleRange(kwargs) => Some(kwargs.mode),
            LegacyProcessingStep::ScaleMeanVariance(kwargs) => Some(kwargs.mode),
            _ => None,
        }
    }

    /// The axis letters the step reduces over or scales along.
    pub fn axes(&self) -> Option<&LegacyAxes> {
        match self {
            LegacyProcessingStep::ScaleLinear(kwargs) => kwargs.axes.as_ref(),
            LegacyProcessingStep::ZeroMeanUnitVariance(kwargs) => kwargs.axes.as_ref(),
            LegacyProcessingStep::ScaleRange(kwargs) => kwargs.axes.as_ref(),
            LegacyProcessingStep::ScaleMeanVariance(kwargs) => kwargs.axes.as_ref(),
            _ => None,
        }
    }
}
