//! Fixed-stride buffer views used by the encoder and the mask decoder.
//!
//! Interleaved buffers are `(height, width, channel)` arrays, planar buffers are
//! `(channel, height, width)` arrays. Converting between them is an axis permutation on an
//! `ndarray` view followed by a standard-layout copy, so no index arithmetic is written by hand.

use ndarray::{Array, Array2, Array3, ArrayView2, ArrayView3, Dimension};

use crate::errors::{RemoveBgError, Result};

/// Single-channel 2D grid of floats, stored row-major as `(height, width)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    data: Array2<f32>,
}

impl ScalarField {
    /// Wrap a row-major buffer of `width * height` values.
    ///
    /// Zero-sized fields are allowed here; operations that cannot work on them
    /// (resampling from an empty source) reject them.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        let expected = checked_len(&[width, height])?;
        if data.len() != expected {
            return Err(RemoveBgError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let data = Array2::from_shape_vec((height, width), data)?;
        Ok(Self { data })
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            data: Array2::from_elem((height, width), value),
        }
    }

    pub(crate) fn from_array(data: Array2<f32>) -> Self {
        if data.is_standard_layout() {
            Self { data }
        } else {
            Self {
                data: data.as_standard_layout().into_owned(),
            }
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        self.data.get((y, x)).copied()
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// Row-major samples.
    pub fn as_slice(&self) -> &[f32] {
        // owned arrays built by this type are always in standard layout
        self.data.as_slice().unwrap_or(&[])
    }

    pub fn into_vec(self) -> Vec<f32> {
        into_compact_vec(self.data)
    }
}

/// Reorder a pixel-major `(row, col, channel)` buffer into channel-major `(channel, row, col)`.
pub fn interleaved_to_planar(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
) -> Result<Vec<f32>> {
    let view = interleaved_view(data, width, height, channels)?;
    Ok(planar_from_view(view))
}

/// Inverse of [`interleaved_to_planar`].
pub fn planar_to_interleaved(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
) -> Result<Vec<f32>> {
    check_shape(data.len(), width, height, channels)?;
    let view = ArrayView3::from_shape((channels, height, width), data)?;
    Ok(into_compact_vec(view.permuted_axes([1, 2, 0]).to_owned()))
}

pub(crate) fn interleaved_view(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
) -> Result<ArrayView3<'_, f32>> {
    check_shape(data.len(), width, height, channels)?;
    Ok(ArrayView3::from_shape((height, width, channels), data)?)
}

/// Copy a `(row, col, channel)` view into a planar buffer.
pub(crate) fn planar_from_view(view: ArrayView3<'_, f32>) -> Vec<f32> {
    into_compact_vec(view.permuted_axes([2, 0, 1]).to_owned())
}

/// Stack per-channel fields of equal size into an interleaved `(row, col, channel)` array.
pub(crate) fn interleave(fields: &[ScalarField]) -> Result<Array3<f32>> {
    let (width, height) = fields
        .first()
        .map(|f| (f.width(), f.height()))
        .ok_or_else(|| RemoveBgError::encoding("no channels to interleave"))?;

    let mut out = Array3::<f32>::zeros((height, width, fields.len()));
    for (c, field) in fields.iter().enumerate() {
        if field.width() != width || field.height() != height {
            return Err(RemoveBgError::ShapeMismatch {
                expected: width * height,
                actual: field.len(),
            });
        }
        out.index_axis_mut(ndarray::Axis(2), c).assign(&field.view());
    }
    Ok(out)
}

fn check_shape(len: usize, width: usize, height: usize, channels: usize) -> Result<()> {
    if width == 0 || height == 0 || channels == 0 {
        return Err(RemoveBgError::InvalidDimensions { width, height });
    }
    let expected = checked_len(&[width, height, channels])?;
    if len != expected {
        return Err(RemoveBgError::ShapeMismatch {
            expected,
            actual: len,
        });
    }
    Ok(())
}

/// Row-major elements of `data`, without any storage before or after them.
pub(crate) fn into_compact_vec<D: Dimension>(data: Array<f32, D>) -> Vec<f32> {
    let data = if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().into_owned()
    };
    let len = data.len();
    let (mut raw, offset) = data.into_raw_vec_and_offset();
    let start = offset.unwrap_or(0);
    raw.truncate(start + len);
    raw.drain(..start);
    raw
}

pub(crate) fn checked_len(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(RemoveBgError::AllocationFailure { bytes: usize::MAX })
}
