use image::{ImageBuffer, RgbaImage};

use crate::config::ModelSpec;
use crate::errors::{RemoveBgError, Result};
use crate::layout::{checked_len, ScalarField};
use crate::resample::{resize, ResizePolicy};
use crate::tensor::Tensor;

/// Interpret a 1×1×H×W model output as a probability field and upsample it to `width` x `height`.
pub fn decode_mask(
    output: &Tensor,
    spec: &ModelSpec,
    width: usize,
    height: usize,
) -> Result<ScalarField> {
    let expected = spec.mask_len();
    if output.len() != expected {
        return Err(RemoveBgError::ShapeMismatch {
            expected,
            actual: output.len(),
        });
    }
    if width == 0 || height == 0 {
        return Err(RemoveBgError::InvalidDimensions { width, height });
    }

    let field = ScalarField::new(
        spec.input_width,
        spec.input_height,
        output.as_slice().to_vec(),
    )?;
    resize(&field, width, height, ResizePolicy::Nearest)
}

/// Write the decoded mask into a copy of `original` as its alpha channel.
///
/// Color samples are copied unchanged; only alpha is replaced. Mask values outside `[0, 1]`
/// are clamped and NaN is treated as background.
pub fn composite(output: &Tensor, original: &RgbaImage, spec: &ModelSpec) -> Result<RgbaImage> {
    let (width, height) = original.dimensions();
    let _span = tracing::debug_span!("composite", width, height).entered();

    let mask = decode_mask(output, spec, width as usize, height as usize)?;

    let len = checked_len(&[width as usize, height as usize, 4])?;
    let mut buffer: Vec<u8> = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| RemoveBgError::AllocationFailure { bytes: len })?;

    let mut clamped = 0usize;
    for (pixel, &probability) in original.pixels().zip(mask.as_slice()) {
        if !(0.0..=1.0).contains(&probability) {
            clamped += 1;
        }
        let [r, g, b, _] = pixel.0;
        buffer.extend_from_slice(&[r, g, b, to_alpha(probability)]);
    }
    if clamped > 0 {
        tracing::warn!(clamped, "mask values outside [0, 1] were clamped");
    }

    into_rgba_image(width, height, buffer)
}

fn into_rgba_image(width: u32, height: u32, buffer: Vec<u8>) -> Result<RgbaImage> {
    let actual = buffer.len();
    ImageBuffer::from_raw(width, height, buffer).ok_or(RemoveBgError::ShapeMismatch {
        expected: width as usize * height as usize * 4,
        actual,
    })
}

fn to_alpha(probability: f32) -> u8 {
    if probability.is_nan() {
        return 0;
    }
    (probability.clamp(0.0, 1.0) * 255.0).round() as u8
}
