// docTR adapter - runs the docTR predictor through a python3 bridge
//
// The bridge prints one JSON object per page: {"lines": ["...", ...]}
use image::DynamicImage;
use log::debug;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use super::{run_metadata, temp_workdir, write_pages};
use crate::command::run_to_string;
use crate::recognition::{EngineConfig, RecognitionOutcome, RecognizerAdapter};
use crate::types::{IngestError, Result};

const ENGINE: &str = "doctr";
const PYTHON: &str = "python3";
const DEFAULT_DET_ARCH: &str = "db_resnet50";
const DEFAULT_RECO_ARCH: &str = "crnn_vgg16_bn";

const BRIDGE: &str = r#"
import json, sys
from doctr.io import DocumentFile
from doctr.models import ocr_predictor
mode, det_arch, reco_arch, pretrained = sys.argv[1:5]
paths = sys.argv[5:]
predictor = ocr_predictor(det_arch=det_arch, reco_arch=reco_arch, pretrained=pretrained == "1")
doc = DocumentFile.from_pdf(paths[0]) if mode == "pdf" else DocumentFile.from_images(paths)
for page in predictor(doc).export()["pages"]:
    lines = []
    for block in page.get("blocks", []):
        for line in block.get("lines", []):
            words = [w.get("value", "") for w in line.get("words", [])]
            if words:
                lines.append(" ".join(words))
    print(json.dumps({"lines": lines}, ensure_ascii=False))
"#;

#[derive(Debug, Deserialize)]
struct BridgePage {
    #[serde(default)]
    lines: Vec<String>,
}

pub struct DoctrAdapter;

pub fn create() -> Result<Box<dyn RecognizerAdapter>> {
    let mut probe = Command::new(PYTHON);
    probe.arg("-c").arg("import doctr");
    run_to_string(&mut probe)
        .map_err(|e| IngestError::unavailable(ENGINE, format!("{:#}", e)))?;
    Ok(Box::new(DoctrAdapter))
}

/// Page texts from the bridge's JSON lines
fn parse_pages(output: &str) -> Result<Vec<String>> {
    output
        .lines()
        .filter(|line| line.trim_start().starts_with('{'))
        .map(|line| {
            serde_json::from_str::<BridgePage>(line)
                .map(|page| page.lines.join("\n"))
                .map_err(|e| IngestError::engine_failed(ENGINE, format!("bad bridge output: {}", e)))
        })
        .collect()
}

impl DoctrAdapter {
    fn run(&self, mode: &str, paths: &[&Path], config: &EngineConfig) -> Result<Vec<String>> {
        let pretrained = config.get_bool("pretrained").unwrap_or(true);
        let mut command = Command::new(PYTHON);
        command
            .arg("-c")
            .arg(BRIDGE)
            .arg(mode)
            .arg(config.get_str("det_arch").unwrap_or(DEFAULT_DET_ARCH))
            .arg(config.get_str("reco_arch").unwrap_or(DEFAULT_RECO_ARCH))
            .arg(if pretrained { "1" } else { "0" })
            .args(paths);
        let output = run_to_string(&mut command)
            .map_err(|e| IngestError::engine_failed(ENGINE, format!("{:#}", e)))?;
        parse_pages(&output)
    }

    fn outcome(started: Instant, pages: Vec<String>) -> RecognitionOutcome {
        let metadata = run_metadata(started, Some(pages.len()));
        let text = pages
            .into_iter()
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        // docTR's export carries no document-level confidence
        RecognitionOutcome::new(text, 0.0, ENGINE, metadata)
    }
}

impl RecognizerAdapter for DoctrAdapter {
    fn name(&self) -> &str {
        ENGINE
    }

    fn supports_pdf(&self) -> bool {
        true
    }

    fn supports_image(&self) -> bool {
        true
    }

    fn recognize_pdf(&mut self, path: &Path, config: &EngineConfig) -> Result<RecognitionOutcome> {
        let started = Instant::now();
        let pages = self.run("pdf", &[path], config)?;
        debug!("doctr read {} pages from {}", pages.len(), path.display());
        Ok(Self::outcome(started, pages))
    }

    fn recognize_images(&mut self, images: &[DynamicImage], config: &EngineConfig) -> Result<RecognitionOutcome> {
        let started = Instant::now();
        if images.is_empty() {
            return Ok(Self::outcome(started, Vec::new()));
        }
        let workdir = temp_workdir(ENGINE)?;
        let files = write_pages(ENGINE, workdir.path(), images)?;
        let paths: Vec<&Path> = files.iter().map(|p| p.as_path()).collect();
        let pages = self.run("images", &paths, config)?;
        Ok(Self::outcome(started, pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bridge_output() {
        let output = "Downloading weights...\n\
                      {\"lines\": [\"Başlık\", \"ikinci satır\"]}\n\
                      {\"lines\": []}\n";
        let pages = parse_pages(output).unwrap();
        assert_eq!(pages, vec!["Başlık\nikinci satır".to_string(), String::new()]);
    }

    #[test]
    fn test_bad_bridge_output() {
        assert!(matches!(
            parse_pages("{\"lines\": 3}"),
            Err(IngestError::EngineFailed { .. })
        ));
    }

    #[test]
    fn test_confidence_is_zero() {
        let outcome = DoctrAdapter::outcome(Instant::now(), vec!["a".into(), "".into(), "b".into()]);
        assert_eq!(outcome.text(), "a\nb");
        assert_eq!(outcome.mean_confidence(), 0.0);
        assert_eq!(outcome.metadata()["pages"], serde_json::Value::from(3));
    }
}
