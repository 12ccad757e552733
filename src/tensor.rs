use ndarray::prelude::*;

use crate::errors::{RemoveBgError, Result};
use crate::layout::{checked_len, into_compact_vec};

/// Flat `f32` buffer with an explicit NCHW shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Array4<f32>,
}

impl Tensor {
    pub fn from_shape_vec(shape: [usize; 4], data: Vec<f32>) -> Result<Self> {
        let expected = checked_len(&shape)?;
        if data.len() != expected {
            return Err(RemoveBgError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let [n, c, h, w] = shape;
        Ok(Self {
            data: Array4::from_shape_vec((n, c, h, w), data)?,
        })
    }

    pub fn zeros(shape: [usize; 4]) -> Self {
        let [n, c, h, w] = shape;
        Self {
            data: Array4::zeros((n, c, h, w)),
        }
    }

    /// Take ownership of `data`. Strided arrays and slices of a larger buffer are compacted so
    /// the backing buffer holds exactly the tensor's elements.
    pub fn from_array(data: Array4<f32>) -> Result<Self> {
        let (n, c, h, w) = data.dim();
        Self::from_shape_vec([n, c, h, w], into_compact_vec(data))
    }

    pub fn shape(&self) -> [usize; 4] {
        let (n, c, h, w) = self.data.dim();
        [n, c, h, w]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        self.data.as_slice().unwrap_or(&[])
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }
}
