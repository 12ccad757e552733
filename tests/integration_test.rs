use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use remove_bg_rs::mocks::MockEngine;
use remove_bg_rs::{Config, ImageProcessor, ModelSpec, RemoveBgError, Tensor};

fn test_config(input_dir: PathBuf, output_dir: PathBuf) -> Config {
    Config {
        input_dir,
        output_dir,
        model_path: "u2netp.onnx".into(),
        format: "png".to_string(),
        device_id: 0,
        num_threads: 2,
        size: ModelSpec::INPUT_SIZE,
    }
}

#[test]
fn test_directory_is_mirrored_with_alpha() -> remove_bg_rs::Result<()> {
    let temp_dir = TempDir::new()?;
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    fs::create_dir_all(input_dir.join("nested"))?;

    RgbImage::from_pixel(40, 30, Rgb([10, 200, 30])).save(input_dir.join("a.png"))?;
    RgbaImage::from_pixel(7, 9, Rgba([1, 2, 3, 4])).save(input_dir.join("nested/b.png"))?;
    fs::write(input_dir.join("notes.txt"), b"not an image")?;

    let spec = ModelSpec::default();
    let processor = ImageProcessor::new(
        MockEngine::constant(&spec, 0.0),
        test_config(input_dir.clone(), output_dir.clone()),
    );
    let summary = processor.process_directory()?;

    assert_eq!(summary.processed, 2);
    assert!(summary.failed.is_empty());

    let a = image::open(output_dir.join("a.png"))?;
    assert_eq!(a.dimensions(), (40, 30));
    let a = a.to_rgba8();
    assert!(a.pixels().all(|p| p.0 == [10, 200, 30, 0]));

    let b = image::open(output_dir.join("nested/b.png"))?.to_rgba8();
    assert_eq!(b.dimensions(), (7, 9));
    assert!(b.pixels().all(|p| p.0 == [1, 2, 3, 0]));

    // sources are left alone
    let source = image::open(input_dir.join("a.png"))?.to_rgb8();
    assert!(source.pixels().all(|p| p.0 == [10, 200, 30]));
    assert!(!output_dir.join("notes.png").exists());
    Ok(())
}

#[test]
fn test_failed_images_are_reported_per_file() -> remove_bg_rs::Result<()> {
    let temp_dir = TempDir::new()?;
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    fs::create_dir_all(&input_dir)?;

    RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])).save(input_dir.join("good.png"))?;
    fs::write(input_dir.join("broken.png"), b"definitely not a png")?;

    let spec = ModelSpec::default();
    let processor = ImageProcessor::new(
        MockEngine::constant(&spec, 1.0),
        test_config(input_dir.clone(), output_dir.clone()),
    );
    let summary = processor.process_directory()?;

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed.len(), 1);
    let (path, err) = &summary.failed[0];
    assert_eq!(path, &input_dir.join("broken.png"));
    assert!(matches!(err, RemoveBgError::ImageProcessing { .. }));
    assert!(output_dir.join("good.png").exists());
    assert!(!output_dir.join("broken.png").exists());
    Ok(())
}

#[test]
fn test_engine_shape_error_leaves_no_output() -> remove_bg_rs::Result<()> {
    let temp_dir = TempDir::new()?;
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    fs::create_dir_all(&input_dir)?;
    RgbImage::from_pixel(4, 4, Rgb([9, 9, 9])).save(input_dir.join("img.png"))?;

    let processor = ImageProcessor::new(
        MockEngine::with_output_shape([1, 1, 1, 10], 1.0),
        test_config(input_dir, output_dir.clone()),
    );
    let summary = processor.process_directory()?;

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.failed.len(), 1);
    assert!(!output_dir.join("img.png").exists());
    Ok(())
}

#[test]
fn test_missing_input_directory() {
    let temp_dir = TempDir::new().unwrap();
    let processor = ImageProcessor::new(
        MockEngine::constant(&ModelSpec::default(), 1.0),
        test_config(
            temp_dir.path().join("missing"),
            temp_dir.path().join("output"),
        ),
    );

    assert!(matches!(
        processor.process_directory(),
        Err(RemoveBgError::FileSystem { .. })
    ));
}

#[test]
fn test_closure_engine_in_processor() -> remove_bg_rs::Result<()> {
    let temp_dir = TempDir::new()?;
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    fs::create_dir_all(&input_dir)?;
    RgbImage::from_pixel(3, 2, Rgb([50, 60, 70])).save(input_dir.join("img.png"))?;

    let engine = |input: &Tensor| -> remove_bg_rs::Result<Tensor> {
        let [n, _, h, w] = input.shape();
        Tensor::from_shape_vec([n, 1, h, w], vec![0.5; n * h * w])
    };
    let processor = ImageProcessor::new(engine, test_config(input_dir, output_dir.clone()));
    processor.process_directory()?;

    let out = image::open(output_dir.join("img.png"))?.to_rgba8();
    assert!(out.pixels().all(|p| p.0 == [50, 60, 70, 128]));
    Ok(())
}
