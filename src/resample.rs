use ndarray::prelude::*;

use crate::errors::{RemoveBgError, Result};
use crate::layout::ScalarField;

/// How destination samples are drawn from the source grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePolicy {
    /// Box-filter average over the source area each destination pixel covers.
    Area,
    /// `src = floor(dst * src_len / dst_len)`, no interpolation.
    Nearest,
}

/// Resize a scalar field to `dst_width` x `dst_height`.
///
/// An empty source is rejected with `InvalidDimensions`; an empty destination yields an empty
/// field. Same-size resizes return the input unchanged for both policies.
pub fn resize(
    field: &ScalarField,
    dst_width: usize,
    dst_height: usize,
    policy: ResizePolicy,
) -> Result<ScalarField> {
    let (src_width, src_height) = (field.width(), field.height());
    if src_width == 0 || src_height == 0 {
        return Err(RemoveBgError::InvalidDimensions {
            width: src_width,
            height: src_height,
        });
    }
    if dst_width == 0 || dst_height == 0 {
        return Ok(ScalarField::filled(dst_width, dst_height, 0.0));
    }
    if (src_width, src_height) == (dst_width, dst_height) {
        return Ok(field.clone());
    }

    let _span = tracing::trace_span!(
        "resize",
        ?policy,
        src_width,
        src_height,
        dst_width,
        dst_height
    )
    .entered();

    let resized = match policy {
        ResizePolicy::Area => area(field.view(), dst_width, dst_height),
        ResizePolicy::Nearest => nearest(field.view(), dst_width, dst_height),
    };
    Ok(ScalarField::from_array(resized))
}

/// Slice-level form of [`resize`] for callers holding a bare row-major buffer.
pub fn resize_raw(
    data: &[f32],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
    policy: ResizePolicy,
) -> Result<Vec<f32>> {
    if src_width == 0 || src_height == 0 {
        return Err(RemoveBgError::InvalidDimensions {
            width: src_width,
            height: src_height,
        });
    }
    let field = ScalarField::new(src_width, src_height, data.to_vec())?;
    Ok(resize(&field, dst_width, dst_height, policy)?.into_vec())
}

fn nearest(src: ArrayView2<f32>, dst_width: usize, dst_height: usize) -> Array2<f32> {
    let (src_height, src_width) = src.dim();
    let cols: Vec<usize> = (0..dst_width)
        .map(|x| nearest_index(x, src_width, dst_width))
        .collect();
    let rows: Vec<usize> = (0..dst_height)
        .map(|y| nearest_index(y, src_height, dst_height))
        .collect();

    Array2::from_shape_fn((dst_height, dst_width), |(y, x)| src[[rows[y], cols[x]]])
}

fn nearest_index(dst: usize, src_len: usize, dst_len: usize) -> usize {
    // dst < dst_len keeps the quotient below src_len
    ((dst as u128 * src_len as u128) / dst_len as u128) as usize
}

/// Separable box filter: horizontal pass into `(src_height, dst_width)`, then vertical.
fn area(src: ArrayView2<f32>, dst_width: usize, dst_height: usize) -> Array2<f32> {
    let (src_height, src_width) = src.dim();
    let col_weights = area_weights(src_width, dst_width);
    let row_weights = area_weights(src_height, dst_height);

    let horizontal = Array2::from_shape_fn((src_height, dst_width), |(y, x)| {
        col_weights[x]
            .iter()
            .map(|&(i, w)| f64::from(src[[y, i]]) * w)
            .sum::<f64>()
    });

    Array2::from_shape_fn((dst_height, dst_width), |(y, x)| {
        row_weights[y]
            .iter()
            .map(|&(j, w)| horizontal[[j, x]] * w)
            .sum::<f64>() as f32
    })
}

/// For each destination index, the source indices it overlaps and their normalized coverage.
fn area_weights(src_len: usize, dst_len: usize) -> Vec<Vec<(usize, f64)>> {
    let scale = src_len as f64 / dst_len as f64;

    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = (d + 1) as f64 * scale;
            let first = (start.floor() as usize).min(src_len - 1);
            let last = (end.ceil() as usize).clamp(first + 1, src_len);

            let mut weights: Vec<(usize, f64)> = (first..last)
                .filter_map(|i| {
                    let overlap = end.min((i + 1) as f64) - start.max(i as f64);
                    (overlap > 0.0).then_some((i, overlap))
                })
                .collect();
            if weights.is_empty() {
                weights.push((first, 1.0));
            }

            let total: f64 = weights.iter().map(|(_, w)| w).sum();
            for (_, w) in &mut weights {
                *w /= total;
            }
            weights
        })
        .collect()
}
