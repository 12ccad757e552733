use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::ModelSpec;
use crate::errors::Result;
use crate::tensor::Tensor;
use crate::traits::InferenceEngine;

/// Test engine that answers every call with a constant mask.
#[derive(Debug)]
pub struct MockEngine {
    pub output_shape: [usize; 4],
    pub value: f32,
    pub calls: AtomicUsize,
}

impl MockEngine {
    /// Mask of the shape `spec` expects, filled with `value`.
    pub const fn constant(spec: &ModelSpec, value: f32) -> Self {
        Self::with_output_shape(spec.mask_shape(), value)
    }

    /// Mask of an arbitrary shape, for exercising shape checks.
    pub const fn with_output_shape(output_shape: [usize; 4], value: f32) -> Self {
        Self {
            output_shape,
            value,
            calls: AtomicUsize::new(0),
        }
    }
}

impl InferenceEngine for MockEngine {
    fn invoke(&self, _input: &Tensor) -> Result<Tensor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let [n, c, h, w] = self.output_shape;
        Tensor::from_shape_vec(self.output_shape, vec![self.value; n * c * h * w])
    }
}
