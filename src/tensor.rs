//! Tensor descriptions for model inputs and outputs.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::axes::{AxisDescr, LegacyAxes};
use crate::common::FileDescr;
use crate::fields::TensorId;
use crate::processing::{LegacyProcessingStep, ProcessingStep};

/// Element type of tensor data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Float32,
    Float64,
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Bool,
}

impl DataType {
    pub const ALL: &'static [DataType] = &[
        DataType::Float32,
        DataType::Float64,
        DataType::Uint8,
        DataType::Int8,
        DataType::Uint16,
        DataType::Int16,
        DataType::Uint32,
        DataType::Int32,
        DataType::Uint64,
        DataType::Int64,
        DataType::Bool,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Uint8 => "uint8",
            DataType::Int8 => "int8",
            DataType::Uint16 => "uint16",
            DataType::Int16 => "int16",
            DataType::Uint32 => "uint32",
            DataType::Int32 => "int32",
            DataType::Uint64 => "uint64",
            DataType::Int64 => "int64",
            DataType::Bool => "bool",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_float32() -> DataType {
    DataType::Float32
}

fn default_uint8() -> DataType {
    DataType::Uint8
}

fn default_unit() -> String {
    "arbitrary unit".to_string()
}

fn default_scale() -> f64 {
    1.0
}

fn is_default_scale(scale: &f64) -> bool {
    *scale == 1.0
}

/// Data whose values belong to a fixed set, e.g. class labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NominalOrOrdinalDataDescr {
    pub values: Vec<Value>,
    #[serde(rename = "type", default = "default_uint8")]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Numeric data with an optional value range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalOrRatioDataDescr {
    #[serde(rename = "type", default = "default_float32")]
    pub data_type: DataType,
    /// Inclusive bounds; `None` means unbounded.
    #[serde(default)]
    pub range: (Option<f64>, Option<f64>),
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default = "default_scale", skip_serializing_if = "is_default_scale")]
    pub scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

impl Default for IntervalOrRatioDataDescr {
    fn default() -> Self {
        Self {
            data_type: DataType::Float32,
            range: (None, None),
            unit: default_unit(),
            scale: 1.0,
            offset: None,
        }
    }
}

/// The `data` field of a v0.5 tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TensorDataDescr {
    NominalOrOrdinal(NominalOrOrdinalDataDescr),
    IntervalOrRatio(IntervalOrRatioDataDescr),
}

impl Default for TensorDataDescr {
    fn default() -> Self {
        TensorDataDescr::IntervalOrRatio(IntervalOrRatioDataDescr::default())
    }
}

impl TensorDataDescr {
    pub fn data_type(&self) -> DataType {
        match self {
            TensorDataDescr::NominalOrOrdinal(data) => data.data_type,
            TensorDataDescr::IntervalOrRatio(data) => data.data_type,
        }
    }
}

fn default_input_id() -> TensorId {
    TensorId::from_static("input")
}

fn default_output_id() -> TensorId {
    TensorId::from_static("output")
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTensorDescrV0_5 {
    #[serde(default = "default_input_id")]
    pub id: TensorId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub axes: Vec<AxisDescr>,
    /// Packaged. An example tensor as `.npy`.
    pub test_tensor: FileDescr,
    /// Packaged. An example image or `.npy` for illustration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_tensor: Option<FileDescr>,
    #[serde(default)]
    pub data: TensorDataDescr,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preprocessing: Vec<ProcessingStep>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTensorDescrV0_5 {
    #[serde(default = "default_output_id")]
    pub id: TensorId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub axes: Vec<AxisDescr>,
    pub test_tensor: FileDescr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_tensor: Option<FileDescr>,
    #[serde(default)]
    pub data: TensorDataDescr,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postprocessing: Vec<ProcessingStep>,
}

/// v0.4 input shape: explicit, or `min + n * step` per axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputShapeV0_4 {
    Explicit(Vec<u64>),
    Parameterized { min: Vec<u64>, step: Vec<u64> },
}

/// v0.4 output shape: explicit, or `input_shape * scale + 2 * offset`
/// relative to `reference_tensor`. A `null` scale marks a new axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputShapeV0_4 {
    Explicit(Vec<u64>),
    Implicit {
        reference_tensor: TensorId,
        scale: Vec<Option<f64>>,
        offset: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTensorDescrV0_4 {
    pub name: TensorId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub axes: LegacyAxes,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_range: Option<(Option<f64>, Option<f64>)>,
    pub shape: InputShapeV0_4,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preprocessing: Vec<LegacyProcessingStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTensorDescrV0_4 {
    pub name: TensorId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub axes: LegacyAxes,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_range: Option<(Option<f64>, Option<f64>)>,
    pub shape: OutputShapeV0_4,
    /// Border cropped from each side, per axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halo: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postprocessing: Vec<LegacyProcessingStep>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_defaults_to_float32() {
        let data: TensorDataDescr = serde_json::from_value(json!({})).unwrap();
        assert_eq!(data.data_type(), DataType::Float32);
        assert_eq!(TensorDataDescr::default(), data);
    }

    #[test]
    fn nominal_data_defaults_to_uint8() {
        let data: TensorDataDescr = serde_json::from_value(json!({"values": [0, 1, 2]})).unwrap();
        assert!(matches!(data, TensorDataDescr::NominalOrOrdinal(_)));
        assert_eq!(data.data_type(), DataType::Uint8);
    }

    #[test]
    fn input_id_defaults() {
        let tensor: InputTensorDescrV0_5 = serde_json::from_value(json!({
            "axes": [{"type": "batch"}, {"type": "space", "id": "x", "size": 64}],
            "test_tensor": {"source": "test_input.npy"}
        }))
        .unwrap();
        assert_eq!(tensor.id.as_str(), "input");
        assert!(tensor.preprocessing.is_empty());
        assert!(!tensor.optional);

        let value = serde_json::to_value(&tensor).unwrap();
        assert!(value.get("optional").is_none());
        assert_eq!(value["data"]["type"], "float32");
    }

    #[test]
    fn legacy_shapes() {
        let shape: InputShapeV0_4 =
            serde_json::from_value(json!({"min": [1, 1, 64, 64], "step": [0, 0, 16, 16]})).unwrap();
        assert!(matches!(shape, InputShapeV0_4::Parameterized { ref min, .. } if min.len() == 4));

        let shape: OutputShapeV0_4 = serde_json::from_value(json!({
            "reference_tensor": "raw",
            "scale": [1.0, null, 1.0, 1.0],
            "offset": [0, 0.5, 0, 0]
        }))
        .unwrap();
        assert!(matches!(
            shape,
            OutputShapeV0_4::Implicit { ref scale, .. } if scale[1].is_none()
        ));
    }

    #[test]
    fn data_type_names() {
        for dtype in DataType::ALL {
            let value = serde_json::to_value(dtype).unwrap();
            assert_eq!(value, json!(dtype.as_str()));
        }
    }
}
