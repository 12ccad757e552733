use std::collections::TryReserveError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error coming from a collaborator outside this crate.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for the background removal pipeline.
///
/// # Why structured errors
///
/// The first five variants are the failure kinds of the transcoding core: every stage fails fast
/// with one of them instead of handing back a zero-filled or truncated buffer. The remaining
/// variants belong to the command-line front end, which deals with files and configuration.
/// The thiserror crate generates Display implementations from the format strings.
#[derive(Error, Debug)]
pub enum RemoveBgError {
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Encoding error: {reason}")]
    Encoding { reason: String },

    #[error("Shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Inference error")]
    Inference {
        #[source]
        source: BoxedSource,
    },

    #[error("Allocation failure: could not allocate {bytes} bytes")]
    AllocationFailure { bytes: usize },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: BoxedSource,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: BoxedSource,
    },
}

pub type Result<T> = std::result::Result<T, RemoveBgError>;

impl RemoveBgError {
    /// Wrap any engine-side failure as an opaque inference error.
    pub fn inference<E>(err: E) -> Self
    where
        E: Into<BoxedSource>,
    {
        Self::Inference { source: err.into() }
    }

    pub(crate) fn encoding(reason: impl Into<String>) -> Self {
        Self::Encoding {
            reason: reason.into(),
        }
    }
}

/// Convert ONNX Runtime errors to inference errors.
///
/// # Why inference category
///
/// Everything ort reports happens inside the external engine (session setup, tensor binding,
/// output extraction), so the pipeline surfaces it as a non-retryable inference failure.
impl From<ort::Error> for RemoveBgError {
    fn from(err: ort::Error) -> Self {
        Self::inference(err)
    }
}

/// Convert ndarray shape errors to encoding errors.
///
/// # Why not `ShapeMismatch`
///
/// ndarray does not report the element counts involved. Call sites that know the counts check
/// them first and construct `ShapeMismatch` directly; anything reaching this conversion keeps
/// ndarray's own message instead.
impl From<ndarray::ShapeError> for RemoveBgError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::encoding(err.to_string())
    }
}

impl From<TryReserveError> for RemoveBgError {
    fn from(_: TryReserveError) -> Self {
        Self::AllocationFailure { bytes: 0 }
    }
}

/// Convert I/O errors to filesystem errors.
///
/// # Why default values for context
///
/// Some I/O errors occur without specific path/operation context. Code that has context should
/// construct `RemoveBgError::FileSystem` directly with the specific path and operation.
impl From<std::io::Error> for RemoveBgError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<image::ImageError> for RemoveBgError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

/// The pipeline step a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Encode,
    Inference,
    Composite,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Encode => "encode",
            Self::Inference => "inference",
            Self::Composite => "composite",
        };
        f.write_str(name)
    }
}

/// Outcome of a failed `remove_background` call: the originating stage plus its error.
#[derive(Error, Debug)]
#[error("Pipeline failed during {stage}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: RemoveBgError,
}

impl PipelineError {
    pub const fn new(stage: PipelineStage, source: RemoveBgError) -> Self {
        Self { stage, source }
    }

    /// The error reported by the failing component.
    pub const fn kind(&self) -> &RemoveBgError {
        &self.source
    }

    pub fn into_inner(self) -> RemoveBgError {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_pipeline_error_keeps_source() {
        let err = PipelineError::new(
            PipelineStage::Composite,
            RemoveBgError::ShapeMismatch {
                expected: 102_400,
                actual: 10,
            },
        );

        assert_eq!(err.to_string(), "Pipeline failed during composite");
        assert!(matches!(
            err.kind(),
            RemoveBgError::ShapeMismatch { actual: 10, .. }
        ));
        let source = err.source().map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("Shape mismatch: expected 102400 elements, got 10")
        );
    }

    #[test]
    fn test_inference_wraps_arbitrary_errors() {
        let err = RemoveBgError::inference("model rejected input");
        assert!(matches!(err, RemoveBgError::Inference { .. }));
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("model rejected input")
        );
    }

    #[test]
    fn test_shape_error_keeps_ndarray_message() {
        let shape_err = ndarray::Array2::<f32>::from_shape_vec((2, 2), vec![0.0; 3]).unwrap_err();
        let message = shape_err.to_string();

        let err: RemoveBgError = shape_err.into();
        match err {
            RemoveBgError::Encoding { reason } => assert_eq!(reason, message),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_try_reserve_maps_to_allocation_failure() {
        let mut buf: Vec<u8> = Vec::new();
        let err: RemoveBgError = buf.try_reserve_exact(usize::MAX).unwrap_err().into();
        assert!(matches!(err, RemoveBgError::AllocationFailure { .. }));
    }
}
