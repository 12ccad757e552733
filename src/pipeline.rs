use image::{DynamicImage, RgbaImage};

use crate::compositor::composite;
use crate::config::ModelSpec;
use crate::encoder::encode;
use crate::errors::{PipelineError, PipelineStage};
use crate::traits::InferenceEngine;

/// Encode, run the engine, and composite the mask onto the source image.
///
/// Either the fully composited image comes back or the error of the first failing stage.
/// `image` is only read.
pub fn remove_background<E>(
    image: &RgbaImage,
    engine: &E,
    spec: &ModelSpec,
) -> Result<RgbaImage, PipelineError>
where
    E: InferenceEngine + ?Sized,
{
    let input = encode(image, spec).map_err(|e| PipelineError::new(PipelineStage::Encode, e))?;

    let output = {
        let _span = tracing::debug_span!("inference").entered();
        engine
            .invoke(&input)
            .map_err(|e| PipelineError::new(PipelineStage::Inference, e))?
    };
    tracing::trace!(shape = ?output.shape(), "engine returned");

    composite(&output, image, spec).map_err(|e| PipelineError::new(PipelineStage::Composite, e))
}

/// A model spec bound to an engine.
pub struct Pipeline<E: InferenceEngine> {
    engine: E,
    spec: ModelSpec,
}

impl<E: InferenceEngine> Pipeline<E> {
    pub const fn new(engine: E, spec: ModelSpec) -> Self {
        Self { engine, spec }
    }

    pub fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage, PipelineError> {
        remove_background(image, &self.engine, &self.spec)
    }

    /// Convenience for decoded files in any pixel format; the result is always RGBA8.
    pub fn segment_image(&self, image: &DynamicImage) -> Result<DynamicImage, PipelineError> {
        let rgba = image.to_rgba8();
        self.remove_background(&rgba).map(DynamicImage::ImageRgba8)
    }
}
