use std::path::Path;

use crate::{
    config::ModelSpec,
    errors::{RemoveBgError, Result},
    tensor::Tensor,
    traits::InferenceEngine,
};
use ndarray::prelude::*;
use ort::value::TensorRef;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};
use parking_lot::Mutex;

fn model_error<E>(operation: impl Into<String>) -> impl FnOnce(E) -> RemoveBgError
where
    E: std::fmt::Display,
{
    let operation = operation.into();
    move |e| RemoveBgError::Model {
        operation,
        source: e.to_string().into(),
    }
}

/// ONNX Runtime session serving as the inference engine.
pub struct OnnxEngine {
    spec: ModelSpec,
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
}

impl OnnxEngine {
    pub fn new(
        model_path: &Path,
        device_id: i32,
        num_threads: usize,
        spec: ModelSpec,
    ) -> Result<Self> {
        spec.validate()?;
        tracing::info!(path = %model_path.display(), device_id, "loading model");

        let mut session = SessionBuilder::new()
            .map_err(model_error("session builder init"))?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(model_error("execution provider setup"))?
            .with_intra_threads(num_threads.max(1))
            .map_err(model_error("intra-op thread setup"))?
            .with_memory_pattern(true)
            .map_err(model_error("memory pattern setup"))?
            .commit_from_file(model_path)
            .map_err(model_error(format!(
                "model file load: {}",
                model_path.display()
            )))?;

        let input = session
            .inputs
            .iter()
            .find(|input| input.name == spec.input_name)
            .or_else(|| session.inputs.first())
            .ok_or_else(|| RemoveBgError::Configuration {
                message: "model has no inputs".to_string(),
            })?;
        let input_name = input.name.clone();

        // dynamic axes come back as -1 and are accepted
        if let Some(shape) = input.input_type.tensor_shape() {
            let expected = spec.input_shape();
            let mismatch = shape
                .iter()
                .zip(expected.iter())
                .any(|(&dim, &want)| dim > 0 && dim as usize != want);
            if shape.len() != 4 || mismatch {
                return Err(RemoveBgError::Configuration {
                    message: format!(
                        "model input {} has shape {:?}, expected {:?}",
                        input_name, shape, expected
                    ),
                });
            }
        }

        let output_name = match &spec.output_name {
            Some(name) => name.clone(),
            None => session
                .outputs
                .first()
                .map(|output| output.name.clone())
                .ok_or_else(|| RemoveBgError::Configuration {
                    message: "model has no outputs".to_string(),
                })?,
        };

        // initialize model
        let data = Array4::<f32>::zeros(spec.input_shape());
        session
            .run(ort::inputs![input_name.as_str() => TensorRef::from_array_view(&data)
                .map_err(model_error("warm-up tensor creation"))?])
            .map_err(model_error("warm-up run"))?;

        tracing::info!(input = %input_name, output = %output_name, "model ready");

        Ok(Self {
            spec,
            input_name,
            output_name,
            session: Mutex::new(session),
        })
    }
}

impl InferenceEngine for OnnxEngine {
    fn invoke(&self, input: &Tensor) -> Result<Tensor> {
        let mut binding = self.session.lock();
        let outputs = binding.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(&input.view().as_standard_layout())?
        ])?;
        let mask = outputs[self.output_name.as_str()].try_extract_array::<f32>()?;
        let actual = mask.len();
        let mask = mask
            .into_dimensionality::<Ix4>()
            .map_err(|_| RemoveBgError::ShapeMismatch {
                expected: self.spec.mask_len(),
                actual,
            })?;
        Tensor::from_array(mask.to_owned())
    }
}
