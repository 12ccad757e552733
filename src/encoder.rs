use image::RgbaImage;
use ndarray::Axis;

use crate::config::ModelSpec;
use crate::errors::{RemoveBgError, Result};
use crate::layout::{checked_len, interleave, interleaved_view, planar_from_view, ScalarField};
use crate::resample::{resize, ResizePolicy};
use crate::tensor::Tensor;

/// Encode `image` into the 1×C×H×W input tensor described by `spec`.
///
/// Each color channel is area-resized to the model resolution on its own, normalized with
/// `(v / scale - mean) / std`, and finally moved from pixel-major to channel-major order.
/// The source alpha channel is dropped.
pub fn encode(image: &RgbaImage, spec: &ModelSpec) -> Result<Tensor> {
    let (width, height) = image.dimensions();
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return Err(RemoveBgError::encoding(format!(
            "source image has zero size ({}x{})",
            width, height
        )));
    }
    spec.validate()?;

    let _span = tracing::debug_span!("encode", width, height).entered();

    let rgb = rgb_samples(image, spec.channels)?;
    let view = interleaved_view(&rgb, width, height, spec.channels)?;

    let channels = view
        .axis_iter(Axis(2))
        .map(|channel| {
            let field = ScalarField::from_array(channel.to_owned());
            resize(
                &field,
                spec.input_width,
                spec.input_height,
                ResizePolicy::Area,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let mut resized = interleave(&channels)?;
    for (c, mut channel) in resized.axis_iter_mut(Axis(2)).enumerate() {
        let (mean, std) = (spec.mean[c], spec.std[c]);
        channel.mapv_inplace(|v| (v / spec.scale - mean) / std);
    }

    let planar = planar_from_view(resized.view());
    Tensor::from_shape_vec(spec.input_shape(), planar)
}

/// Interleaved color samples with alpha stripped, as floats in `0..=255`.
fn rgb_samples(image: &RgbaImage, channels: usize) -> Result<Vec<f32>> {
    let (width, height) = image.dimensions();
    let len = checked_len(&[width as usize, height as usize, channels])?;

    let mut samples = Vec::new();
    samples
        .try_reserve_exact(len)
        .map_err(|_| RemoveBgError::AllocationFailure {
            bytes: len.saturating_mul(std::mem::size_of::<f32>()),
        })?;
    samples.extend(
        image
            .pixels()
            .flat_map(|pixel| pixel.0[..channels].iter().map(|&v| f32::from(v))),
    );
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use nshare::AsNdarray3;

    #[test]
    fn test_output_shape_is_fixed() -> Result<()> {
        let spec = ModelSpec::default();
        for (w, h) in [(1, 1), (2, 2), (17, 3), (320, 320), (641, 480)] {
            let image = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
            let tensor = encode(&image, &spec)?;
            assert_eq!(tensor.shape(), [1, 3, 320, 320]);
            assert_eq!(tensor.len(), 3 * 320 * 320);
        }
        Ok(())
    }

    #[test]
    fn test_uniform_color_is_normalized_per_plane() -> Result<()> {
        let spec = ModelSpec::default();
        let image = RgbaImage::from_pixel(3, 5, Rgba([255, 51, 0, 7]));
        let tensor = encode(&image, &spec)?;

        let plane = spec.mask_len();
        let data = tensor.as_slice();
        assert!(data[..plane].iter().all(|v| (v - 1.0).abs() < 1e-5));
        assert!(data[plane..2 * plane].iter().all(|v| (v - 0.2).abs() < 1e-5));
        assert!(data[2 * plane..].iter().all(|v| v.abs() < 1e-5));
        Ok(())
    }

    #[test]
    fn test_alpha_is_ignored() -> Result<()> {
        let spec = ModelSpec::default().with_size(8);
        let opaque = RgbaImage::from_fn(5, 4, |x, y| Rgba([x as u8 * 40, y as u8 * 60, 9, 255]));
        let mut transparent = opaque.clone();
        for pixel in transparent.pixels_mut() {
            pixel.0[3] = 0;
        }
        assert_eq!(encode(&opaque, &spec)?, encode(&transparent, &spec)?);
        Ok(())
    }

    #[test]
    fn test_matches_planar_view_at_native_size() -> Result<()> {
        let spec = ModelSpec::default().with_size(6);
        let image = RgbaImage::from_fn(6, 6, |x, y| {
            Rgba([(x * 40) as u8, (y * 40) as u8, ((x + y) * 20) as u8, 128])
        });
        let tensor = encode(&image, &spec)?;

        let rgb = image::DynamicImage::ImageRgba8(image).into_rgb8();
        let planes = rgb.as_ndarray3();
        let expected: Vec<f32> = planes.iter().map(|&v| f32::from(v) / 255.0).collect();
        assert_eq!(tensor.as_slice(), expected.as_slice());
        Ok(())
    }

    #[test]
    fn test_mean_std_shift() -> Result<()> {
        let mut spec = ModelSpec::default().with_size(2);
        spec.mean = [0.5, 0.5, 0.5];
        spec.std = [0.5, 0.25, 1.0];
        let image = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let tensor = encode(&image, &spec)?;

        let data = tensor.as_slice();
        assert!(data[..4].iter().all(|v| (v - 1.0).abs() < 1e-5));
        assert!(data[4..8].iter().all(|v| (v - 2.0).abs() < 1e-5));
        assert!(data[8..].iter().all(|v| (v - 0.5).abs() < 1e-5));
        Ok(())
    }

    #[test]
    fn test_zero_sized_image_is_rejected() {
        let image = RgbaImage::new(0, 4);
        assert!(matches!(
            encode(&image, &ModelSpec::default()),
            Err(RemoveBgError::Encoding { .. })
        ));
    }

    #[test]
    fn test_source_is_untouched() -> Result<()> {
        let image = RgbaImage::from_fn(9, 4, |x, y| Rgba([x as u8, y as u8, 3, 200]));
        let before = image.clone();
        encode(&image, &ModelSpec::default())?;
        assert_eq!(image, before);
        Ok(())
    }
}
