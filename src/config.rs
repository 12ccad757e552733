use std::path::PathBuf;
use std::thread;

use clap::Parser;
use image::ImageFormat;

use crate::errors::{RemoveBgError, Result};

/// Model-specific constants for the tensor encoder and mask decoder.
///
/// The defaults match the bundled U²-Net-p model: a 1×3×320×320 input scaled by 1/255 with no
/// mean/std shift, and a 1×1×320×320 foreground probability output. Another model swaps these
/// values instead of editing the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub input_width: usize,
    pub input_height: usize,
    /// Color channels fed to the model. Source alpha is never one of them.
    pub channels: usize,
    pub scale: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub input_name: String,
    /// `None` picks the first output of the session.
    pub output_name: Option<String>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::u2netp()
    }
}

impl ModelSpec {
    pub const INPUT_SIZE: usize = 320;

    pub fn u2netp() -> Self {
        Self {
            input_width: Self::INPUT_SIZE,
            input_height: Self::INPUT_SIZE,
            channels: 3,
            scale: 255.0,
            mean: [0.0; 3],
            std: [1.0; 3],
            input_name: "input".to_string(),
            output_name: None,
        }
    }

    /// Same model constants at a different square input resolution.
    pub fn with_size(mut self, size: usize) -> Self {
        self.input_width = size;
        self.input_height = size;
        self
    }

    /// Element count of the 1×C×H×W input tensor.
    pub const fn input_len(&self) -> usize {
        self.channels * self.input_width * self.input_height
    }

    /// Element count of the 1×1×H×W mask tensor.
    pub const fn mask_len(&self) -> usize {
        self.input_width * self.input_height
    }

    pub const fn input_shape(&self) -> [usize; 4] {
        [1, self.channels, self.input_height, self.input_width]
    }

    pub const fn mask_shape(&self) -> [usize; 4] {
        [1, 1, self.input_height, self.input_width]
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(RemoveBgError::InvalidDimensions {
                width: self.input_width,
                height: self.input_height,
            });
        }
        if self.channels != 3 {
            return Err(RemoveBgError::Configuration {
                message: format!("only RGB input is supported, got {} channels", self.channels),
            });
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(RemoveBgError::Configuration {
                message: format!("normalization scale must be positive, got {}", self.scale),
            });
        }
        if self.std.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(RemoveBgError::Configuration {
                message: format!("normalization std must be positive, got {:?}", self.std),
            });
        }
        Ok(())
    }
}

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    pub input_dir: PathBuf,

    #[arg(default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(short, long)]
    pub model_path: PathBuf,

    #[arg(short, long, default_value = "png", value_parser = check_format)]
    pub format: String,

    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,

    #[arg(short, long, default_value_t = default_threads())]
    pub num_threads: usize,

    /// Square model input resolution.
    #[arg(long, default_value_t = ModelSpec::INPUT_SIZE)]
    pub size: usize,
}

impl Config {
    pub fn model_spec(&self) -> ModelSpec {
        ModelSpec::u2netp().with_size(self.size)
    }
}

fn default_threads() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

fn check_format(s: &str) -> std::result::Result<String, String> {
    let supported: Vec<_> = ImageFormat::all()
        .filter(|f| f.writing_enabled())
        .flat_map(|f| f.extensions_str())
        .map(|s| format!("`{}`", s))
        .collect();
    let supported_message = format!("Supported formats: {}", supported.join(", "));

    let format = ImageFormat::from_extension(s)
        .ok_or(format!("{} is not supported. {}", s, supported_message))?;
    if !format.writing_enabled() {
        return Err(format!("{} is not supported. {}", s, supported_message));
    }
    // formats without transparency would drop the mask
    if !matches!(
        format,
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Tiff | ImageFormat::Avif
    ) {
        return Err(format!("{} cannot store an alpha channel", s));
    }

    Ok(s.to_string())
}
