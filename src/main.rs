use std::{error::Error, iter};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use rayon::ThreadPoolBuilder;
use tracing_subscriber::EnvFilter;

use remove_bg_rs::{Config, ImageProcessor};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    ensure!(config.model_path.exists(), "Model path does not exist");
    ensure!(config.input_dir.is_dir(), "Input directory does not exist");

    ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build_global()?;

    let processor = ImageProcessor::with_onnx_model(config)
        .context("Failed to initialize the inference engine")?;
    let summary = processor
        .process_directory()
        .context("Failed to process the input directory")?;

    for (path, err) in &summary.failed {
        let first: &(dyn Error + 'static) = err;
        let chain: Vec<String> = iter::successors(Some(first), |e| (*e).source())
            .map(ToString::to_string)
            .collect();
        eprintln!("{}: {}", path.display(), chain.join(": "));
    }
    ensure!(
        summary.failed.is_empty(),
        "{} of {} images failed",
        summary.failed.len(),
        summary.failed.len() + summary.processed
    );

    Ok(())
}
