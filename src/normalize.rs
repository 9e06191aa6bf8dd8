//! Implicit `ensure_dtype` steps for v0.5 models.
//!
//! Preprocessing always starts by casting to the input's declared data type,
//! and postprocessing always ends with a cast to the output's declared data
//! type, unless the lists already do so. Applied once the checks have run,
//! so reported step indices match the document; applying it again changes
//! nothing.

use crate::model::ModelDescrV0_5;
use crate::processing::ProcessingStep;
use crate::tensor::DataType;

/// Insert `ensure_dtype(dtype)` at index 0 unless the list starts with one.
pub fn normalize_preprocessing(steps: &mut Vec<ProcessingStep>, dtype: DataType) {
    if !matches!(steps.first(), Some(ProcessingStep::EnsureDtype(_))) {
        steps.insert(0, ProcessingStep::ensure_dtype(dtype));
    }
}

/// Append `ensure_dtype(dtype)` unless the list ends with `ensure_dtype` or
/// `binarize`.
pub fn normalize_postprocessing(steps: &mut Vec<ProcessingStep>, dtype: DataType) {
    if !matches!(
        steps.last(),
        Some(ProcessingStep::EnsureDtype(_) | ProcessingStep::Binarize(_))
    ) {
        steps.push(ProcessingStep::ensure_dtype(dtype));
    }
}

/// Normalize the processing lists of every tensor of `model`.
pub fn normalize_model(model: &mut ModelDescrV0_5) {
    for input in &mut model.inputs {
        let dtype = input.data.data_type();
        normalize_preprocessing(&mut input.preprocessing, dtype);
    }
    for output in &mut model.outputs {
        let dtype = output.data.data_type();
        normalize_postprocessing(&mut output.postprocessing, dtype);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{BinarizeKwargs, ClipKwargs};

    fn clip() -> ProcessingStep {
        ProcessingStep::Clip(ClipKwargs { min: 0.0, max: 1.0 })
    }

    #[test]
    fn empty_preprocessing_gets_ensure_dtype() {
        let mut steps = Vec::new();
        normalize_preprocessing(&mut steps, DataType::Uint8);
        assert_eq!(steps, vec![ProcessingStep::ensure_dtype(DataType::Uint8)]);
    }

    #[test]
    fn preprocessing_cast_goes_first() {
        let mut steps = vec![clip()];
        normalize_preprocessing(&mut steps, DataType::Float32);
        assert_eq!(
            steps,
            vec![ProcessingStep::ensure_dtype(DataType::Float32), clip()]
        );
    }

    #[test]
    fn preprocessing_keeps_existing_leading_cast() {
        let mut steps = vec![ProcessingStep::ensure_dtype(DataType::Float64), clip()];
        normalize_preprocessing(&mut steps, DataType::Float32);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0], ProcessingStep::ensure_dtype(DataType::Float64));
    }

    #[test]
    fn postprocessing_cast_goes_last() {
        let mut steps = vec![clip()];
        normalize_postprocessing(&mut steps, DataType::Uint16);
        assert_eq!(
            steps,
            vec![clip(), ProcessingStep::ensure_dtype(DataType::Uint16)]
        );
    }

    #[test]
    fn postprocessing_ending_in_binarize_unchanged() {
        let binarize = ProcessingStep::Binarize(BinarizeKwargs::Single { threshold: 0.5 });
        let mut steps = vec![clip(), binarize.clone()];
        normalize_postprocessing(&mut steps, DataType::Float32);
        assert_eq!(steps, vec![clip(), binarize]);
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut pre = vec![clip()];
        let mut post = vec![clip()];
        normalize_preprocessing(&mut pre, DataType::Uint8);
        normalize_postprocessing(&mut post, DataType::Uint8);
        let (pre_once, post_once) = (pre.clone(), post.clone());
        normalize_preprocessing(&mut pre, DataType::Uint8);
        normalize_postprocessing(&mut post, DataType::Uint8);
        assert_eq!(pre, pre_once);
        assert_eq!(post, post_once);
    }
}
