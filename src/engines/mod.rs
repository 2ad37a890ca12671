// Bundled recognizer adapters and the helpers they share
pub mod doctr;
pub mod donut;
pub mod easyocr;
pub mod nougat;
pub mod paddle;
#[cfg(feature = "onnx")]
mod seq2seq;
pub mod tesseract;
#[cfg(feature = "onnx")]
mod tokenizer;
pub mod trocr;

use image::{DynamicImage, ImageFormat};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::command::command_available;
use crate::recognition::Metadata;
use crate::types::{IngestError, Result};

/// Fails with `DependencyUnavailable` when `program` cannot be spawned.
pub(crate) fn require_command(engine: &str, program: &str) -> Result<()> {
    if command_available(program) {
        Ok(())
    } else {
        Err(IngestError::unavailable(
            engine,
            format!("`{}` not found on PATH", program),
        ))
    }
}

/// Writes each page as PNG into `dir`, returning the paths in page order.
pub(crate) fn write_pages(engine: &str, dir: &Path, images: &[DynamicImage]) -> Result<Vec<PathBuf>> {
    images
        .iter()
        .enumerate()
        .map(|(index, image)| {
            let path = dir.join(format!("page-{:04}.png", index + 1));
            image
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|e| IngestError::engine_failed(engine, format!("writing page image: {}", e)))?;
            Ok(path)
        })
        .collect()
}

pub(crate) fn temp_workdir(engine: &str) -> Result<tempfile::TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("ocr-ingest-{}-", engine))
        .tempdir()
        .map_err(|e| IngestError::engine_failed(engine, format!("temp dir: {}", e)))
}

/// Common run metadata: elapsed milliseconds and page count
pub(crate) fn run_metadata(started: Instant, pages: Option<usize>) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(
        "elapsed_ms".to_string(),
        Value::from(started.elapsed().as_millis() as u64),
    );
    metadata.insert(
        "pages".to_string(),
        pages.map(Value::from).unwrap_or(Value::Null),
    );
    metadata
}

/// Device label for model-backed engines
pub(crate) fn device_label(use_gpu: bool) -> &'static str {
    if use_gpu {
        "cuda"
    } else {
        "cpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_write_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let images = vec![
            DynamicImage::ImageRgb8(RgbImage::new(4, 4)),
            DynamicImage::ImageRgb8(RgbImage::new(4, 4)),
        ];
        let paths = write_pages("test", dir.path(), &images).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("page-0001.png"));
        assert!(paths[1].exists());
    }

    #[test]
    fn test_run_metadata_keys() {
        let metadata = run_metadata(Instant::now(), Some(3));
        assert!(metadata.contains_key("elapsed_ms"));
        assert_eq!(metadata["pages"], Value::from(3));
        assert_eq!(run_metadata(Instant::now(), None)["pages"], Value::Null);
    }

    #[test]
    fn test_missing_command_is_dependency_error() {
        let err = require_command("ghost", "definitely-not-a-real-binary-4821").unwrap_err();
        assert!(matches!(err, IngestError::DependencyUnavailable { .. }));
    }
}
