pub mod compositor;
pub mod config;
pub mod encoder;
pub mod errors;
pub mod layout;
pub mod model;
pub mod pipeline;
pub mod resample;
pub mod tensor;
pub mod traits;

pub mod mocks;

use image::ImageFormat;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub use compositor::{composite, decode_mask};
pub use config::{Config, ModelSpec};
pub use encoder::encode;
pub use errors::{PipelineError, PipelineStage, RemoveBgError, Result};
pub use layout::{interleaved_to_planar, planar_to_interleaved, ScalarField};
pub use model::OnnxEngine;
pub use pipeline::{remove_background, Pipeline};
pub use resample::{resize, resize_raw, ResizePolicy};
pub use tensor::Tensor;
pub use traits::*;

/// Outcome of a directory run. Failed files are listed with their error; their outputs are not
/// written.
#[derive(Debug, Default)]
pub struct ProcessSummary {
    pub processed: usize,
    pub failed: Vec<(PathBuf, RemoveBgError)>,
}

/// Runs the pipeline over every supported image below `input_dir`, mirroring the directory
/// layout under `output_dir`.
pub struct ImageProcessor<E: InferenceEngine> {
    pipeline: Pipeline<E>,
    config: Config,
}

impl<E: InferenceEngine> ImageProcessor<E> {
    pub fn new(engine: E, config: Config) -> Self {
        let spec = config.model_spec();
        Self {
            pipeline: Pipeline::new(engine, spec),
            config,
        }
    }

    pub fn process_directory(&self) -> Result<ProcessSummary> {
        let input_path = &self.config.input_dir;
        let output_path = &self.config.output_dir;

        if !input_path.is_dir() {
            return Err(RemoveBgError::FileSystem {
                path: input_path.clone(),
                operation: "input directory check".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "input directory does not exist",
                ),
            });
        }

        fs::create_dir_all(output_path).map_err(|e| RemoveBgError::FileSystem {
            path: output_path.clone(),
            operation: "create output directory".to_string(),
            source: e,
        })?;

        let image_files = self.collect_image_files(input_path);

        if image_files.is_empty() {
            tracing::warn!(dir = %input_path.display(), "no images to process");
            return Ok(ProcessSummary::default());
        }

        let pb = ProgressBar::new(image_files.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .map_err(|e| RemoveBgError::Configuration {
                message: e.to_string(),
            })?
            .progress_chars("#>-"),
        );

        let failed: Vec<(PathBuf, RemoveBgError)> = image_files
            .par_iter()
            .progress_with(pb.clone())
            .filter_map(|input_file| {
                self.process_single_image(input_file, output_path)
                    .err()
                    .map(|e| {
                        tracing::error!(file = %input_file.display(), error = %e, "failed");
                        (input_file.clone(), e)
                    })
            })
            .collect();

        pb.finish_and_clear();
        let summary = ProcessSummary {
            processed: image_files.len() - failed.len(),
            failed,
        };
        tracing::info!(
            processed = summary.processed,
            failed = summary.failed.len(),
            "directory done"
        );
        Ok(summary)
    }

    fn collect_image_files(&self, input_path: &Path) -> Vec<PathBuf> {
        let mut image_files: Vec<PathBuf> = WalkDir::new(input_path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.is_supported_image_format(e.path()))
            .map(|e| e.into_path())
            .collect();
        image_files.sort();
        image_files
    }

    pub fn is_supported_image_format(&self, path: &Path) -> bool {
        ImageFormat::from_path(path).is_ok_and(|format| format.reading_enabled())
    }

    pub fn process_single_image(&self, input_file: &Path, output_dir: &Path) -> Result<()> {
        let img = image::open(input_file).map_err(|e| RemoveBgError::ImageProcessing {
            path: input_file.display().to_string(),
            operation: "image load".to_string(),
            source: Box::new(e),
        })?;

        let processed_img =
            self.pipeline
                .segment_image(&img)
                .map_err(|e| RemoveBgError::ImageProcessing {
                    path: input_file.display().to_string(),
                    operation: "background removal".to_string(),
                    source: Box::new(e),
                })?;

        let relative_path = self.get_relative_path(input_file)?;
        let output_file = output_dir
            .join(relative_path)
            .with_extension(&self.config.format);

        if let Some(parent) = output_file.parent() {
            fs::create_dir_all(parent).map_err(|e| RemoveBgError::FileSystem {
                path: parent.to_path_buf(),
                operation: "create output subdirectory".to_string(),
                source: e,
            })?;
        }

        let output_format =
            ImageFormat::from_extension(&self.config.format).unwrap_or(ImageFormat::Png);

        processed_img
            .save_with_format(&output_file, output_format)
            .map_err(|e| RemoveBgError::ImageProcessing {
                path: output_file.display().to_string(),
                operation: "image save".to_string(),
                source: Box::new(e),
            })?;

        tracing::debug!(output = %output_file.display(), "saved");
        Ok(())
    }

    pub fn get_relative_path(&self, input_file: &Path) -> Result<PathBuf> {
        let input_dir = &self.config.input_dir;
        input_file
            .strip_prefix(input_dir)
            .map(|p| p.to_path_buf())
            .map_err(|_| RemoveBgError::FileSystem {
                path: input_file.to_path_buf(),
                operation: "relative path".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "file is not inside the input directory",
                ),
            })
    }
}

impl ImageProcessor<OnnxEngine> {
    pub fn with_onnx_model(config: Config) -> Result<Self> {
        let engine = OnnxEngine::new(
            &config.model_path,
            config.device_id,
            config.num_threads,
            config.model_spec(),
        )?;
        Ok(Self::new(engine, config))
    }
}
