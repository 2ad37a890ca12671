// Nougat adapter - academic-document model driven through the nougat CLI
//
// nougat <pdf> -o <outdir> [-m <model>] [--pages <range>]
// Output lands in <outdir>/<stem>.mmd (Mathpix-flavoured markdown).
use log::debug;
use serde_json::Value;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use super::{device_label, require_command, run_metadata, temp_workdir};
use crate::command::run_to_string;
use crate::recognition::{EngineConfig, RecognitionOutcome, RecognizerAdapter};
use crate::types::{IngestError, Result};

const ENGINE: &str = "nougat";
const DEFAULT_MODEL: &str = "0.1.0-small";

pub struct NougatAdapter;

pub fn create() -> Result<Box<dyn RecognizerAdapter>> {
    require_command(ENGINE, ENGINE)?;
    Ok(Box::new(NougatAdapter))
}

/// Markdown nougat wrote for `pdf` into `outdir`
fn read_markdown(outdir: &Path, pdf: &Path) -> Result<String> {
    let stem = pdf
        .file_stem()
        .ok_or_else(|| IngestError::engine_failed(ENGINE, "input has no file name"))?;
    let mut output = outdir.join(stem);
    output.set_extension("mmd");
    std::fs::read_to_string(&output).map_err(|e| {
        IngestError::engine_failed(ENGINE, format!("reading {}: {}", output.display(), e))
    })
}

impl RecognizerAdapter for NougatAdapter {
    fn name(&self) -> &str {
        ENGINE
    }

    fn supports_pdf(&self) -> bool {
        true
    }

    fn supports_image(&self) -> bool {
        false
    }

    fn recognize_pdf(&mut self, path: &Path, config: &EngineConfig) -> Result<RecognitionOutcome> {
        let started = Instant::now();
        let outdir = temp_workdir(ENGINE)?;

        let mut command = Command::new(ENGINE);
        command.arg(path).arg("-o").arg(outdir.path());
        command.arg("-m").arg(config.model().unwrap_or(DEFAULT_MODEL));
        if let Some(pages) = config.get_str("pages") {
            command.arg("--pages").arg(pages);
        }
        if !config.use_gpu() {
            command.env("CUDA_VISIBLE_DEVICES", "");
        }
        run_to_string(&mut command)
            .map_err(|e| IngestError::engine_failed(ENGINE, format!("{:#}", e)))?;

        let text = read_markdown(outdir.path(), path)?;
        debug!("nougat produced {} chars for {}", text.len(), path.display());

        let mut metadata = run_metadata(started, None);
        metadata.insert("device".to_string(), Value::from(device_label(config.use_gpu())));
        Ok(RecognitionOutcome::new(text.trim().to_string(), 0.0, ENGINE, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_mmd_named_after_input() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("paper.mmd"), "# Title\n\n$$x^2$$\n").unwrap();
        let text = read_markdown(dir.path(), Path::new("/in/paper.pdf")).unwrap();
        assert!(text.starts_with("# Title"));
    }

    #[test]
    fn test_missing_output_is_engine_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_markdown(dir.path(), Path::new("/in/paper.pdf")).unwrap_err();
        assert!(matches!(err, IngestError::EngineFailed { .. }));
    }

    #[test]
    fn test_images_unsupported() {
        let mut adapter = NougatAdapter;
        let err = adapter.recognize_images(&[], &EngineConfig::new()).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedOperation { .. }));
    }
}
