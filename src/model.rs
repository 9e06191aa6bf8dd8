//! Model descriptions, format versions 0.4 and 0.5.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::{Author, GenericBaseV0_2, GenericBaseV0_3, LinkedResource};
use crate::descr::{DatasetDescrV0_2, DatasetDescrV0_3};
use crate::fields::FileSource;
use crate::tensor::{
    InputTensorDescrV0_4, InputTensorDescrV0_5, OutputTensorDescrV0_4, OutputTensorDescrV0_5,
};
use crate::weights::{WeightsDescrV0_4, WeightsDescrV0_5};

/// Custom run mode for this model, for more complex prediction procedures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub kwargs: Map<String, Value>,
}

/// The dataset a model was trained on: described inline or linked by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrainingData<D> {
    Described(Box<D>),
    Linked(LinkedResource),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescrV0_4 {
    #[serde(flatten)]
    pub base: GenericBaseV0_2,
    pub inputs: Vec<InputTensorDescrV0_4>,
    pub outputs: Vec<OutputTensorDescrV0_4>,
    /// Packaged. One `.npy` test input per input tensor.
    pub test_inputs: Vec<FileSource>,
    /// Packaged. One `.npy` test output per output tensor.
    pub test_outputs: Vec<FileSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_inputs: Vec<FileSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_outputs: Vec<FileSource>,
    /// ISO 8601 creation time.
    pub timestamp: String,
    pub weights: WeightsDescrV0_4,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packaged_by: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<LinkedResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_mode: Option<RunMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_data: Option<TrainingData<DatasetDescrV0_2>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescrV0_5 {
    #[serde(flatten)]
    pub base: GenericBaseV0_3,
    pub inputs: Vec<InputTensorDescrV0_5>,
    pub outputs: Vec<OutputTensorDescrV0_5>,
    pub timestamp: String,
    pub weights: WeightsDescrV0_5,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packaged_by: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<LinkedResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_mode: Option<RunMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_data: Option<TrainingData<DatasetDescrV0_3>>,
}

/// A model description of any supported format version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModelDescr {
    V0_4(Box<ModelDescrV0_4>),
    V0_5(Box<ModelDescrV0_5>),
}

/// Tensor ids of a v0.5 model, inputs first.
pub(crate) fn tensor_kinds(model: &ModelDescrV0_5) -> Vec<(&'static str, usize, &str)> {
    let inputs = model
        .inputs
        .iter()
        .enumerate()
        .map(|(i, t)| ("inputs", i, t.id.as_str()));
    let outputs = model
        .outputs
        .iter()
        .enumerate()
        .map(|(i, t)| ("outputs", i, t.id.as_str()));
    inputs.chain(outputs).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_v0_5() -> Value {
        json!({
            "type": "model",
            "format_version": "0.5.4",
            "name": "UNet 2D nuclei",
            "description": "segments nuclei",
            "inputs": [{
                "id": "raw",
                "axes": [{"type": "batch"}, {"type": "space", "id": "y", "size": 256}],
                "test_tensor": {"source": "test_input.npy"}
            }],
            "outputs": [{
                "id": "mask",
                "axes": [{"type": "batch"}, {"type": "space", "id": "y", "size": {"tensor_id": "raw", "axis_id": "y"}}],
                "test_tensor": {"source": "test_output.npy"}
            }],
            "timestamp": "2024-01-01T00:00:00",
            "weights": {"onnx": {"source": "weights.onnx", "opset_version": 15}}
        })
    }

    #[test]
    fn model_v0_5_parses() {
        let model: ModelDescrV0_5 = serde_json::from_value(minimal_v0_5()).unwrap();
        assert_eq!(model.inputs[0].id.as_str(), "raw");
        assert_eq!(model.base.name, "UNet 2D nuclei");
        let kinds = tensor_kinds(&model);
        assert_eq!(kinds, vec![("inputs", 0, "raw"), ("outputs", 0, "mask")]);
    }

    #[test]
    fn training_data_linked_or_described() {
        let mut doc = minimal_v0_5();
        doc["training_data"] = json!({"id": "affable-shark"});
        let model: ModelDescrV0_5 = serde_json::from_value(doc.clone()).unwrap();
        assert!(matches!(model.training_data, Some(TrainingData::Linked(_))));

        doc["training_data"] = json!({
            "type": "dataset",
            "format_version": "0.3.0",
            "name": "nuclei",
            "description": "nuclei images"
        });
        let model: ModelDescrV0_5 = serde_json::from_value(doc).unwrap();
        assert!(matches!(model.training_data, Some(TrainingData::Described(_))));
    }

    #[test]
    fn model_v0_5_serializes_flat() {
        let model: ModelDescrV0_5 = serde_json::from_value(minimal_v0_5()).unwrap();
        let value = serde_json::to_value(&model).unwrap();
        assert_eq!(value["type"], "model");
        assert_eq!(value["format_version"], "0.5.4");
        assert!(value.get("base").is_none());
    }
}
