// EasyOCR adapter - runs the easyocr CLI and parses its detail rows
//
// easyocr -l <lang> -f <page.png> --detail 1
// Each result line is a python tuple: ([[x, y], ...], 'text', 0.97)
use image::DynamicImage;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::process::Command;
use std::time::Instant;

use super::{require_command, run_metadata, temp_workdir, write_pages};
use crate::command::run_to_string;
use crate::recognition::outcome::mean_score;
use crate::recognition::{EngineConfig, RecognitionOutcome, RecognizerAdapter};
use crate::types::{IngestError, Result};

const ENGINE: &str = "easyocr";
const DEFAULT_LANG: &str = "tr";

static DETAIL_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\((?P<bbox>\[.*\]),\s*['"](?P<text>.*)['"],\s*(?:np\.float\d+\()?(?P<conf>[-+0-9.eE]+)\)?\)\s*$"#)
        .expect("valid easyocr row pattern")
});

pub struct EasyOcrAdapter;

pub fn create() -> Result<Box<dyn RecognizerAdapter>> {
    require_command(ENGINE, ENGINE)?;
    Ok(Box::new(EasyOcrAdapter))
}

fn easyocr_lang(lang: Option<&str>) -> String {
    match lang {
        None => DEFAULT_LANG.to_string(),
        Some("zh") => "ch_sim".to_string(),
        Some(other) => other.to_string(),
    }
}

/// (text, confidence) pairs from CLI output; unparseable lines are skipped
fn parse_rows(output: &str) -> Vec<(String, f32)> {
    output
        .lines()
        .filter_map(|line| {
            let caps = DETAIL_ROW.captures(line.trim())?;
            let text = caps["text"].replace("\\'", "'").replace("\\\"", "\"");
            let conf = caps["conf"].parse::<f32>().ok()?;
            Some((text, conf))
        })
        .collect()
}

impl RecognizerAdapter for EasyOcrAdapter {
    fn name(&self) -> &str {
        ENGINE
    }

    fn supports_pdf(&self) -> bool {
        false
    }

    fn supports_image(&self) -> bool {
        true
    }

    fn recognize_images(&mut self, images: &[DynamicImage], config: &EngineConfig) -> Result<RecognitionOutcome> {
        let started = Instant::now();
        let lang = easyocr_lang(config.lang());
        let workdir = temp_workdir(ENGINE)?;
        let pages = write_pages(ENGINE, workdir.path(), images)?;

        let mut texts = Vec::new();
        let mut scores = Vec::new();
        for page in &pages {
            let mut command = Command::new(ENGINE);
            command
                .arg("-l")
                .arg(&lang)
                .arg("-f")
                .arg(page)
                .arg("--detail")
                .arg("1");
            if !config.use_gpu() {
                // argparse treats any non-empty value as true
                command.arg("--gpu").arg("");
            }
            let output = run_to_string(&mut command)
                .map_err(|e| IngestError::engine_failed(ENGINE, format!("{:#}", e)))?;
            let rows = parse_rows(&output);
            debug!("easyocr read {} regions from {}", rows.len(), page.display());
            for (text, conf) in rows {
                texts.push(text);
                scores.push(conf);
            }
        }

        let mut metadata = run_metadata(started, Some(images.len()));
        metadata.insert("lang".to_string(), Value::from(lang));
        Ok(RecognitionOutcome::new(texts.join("\n"), mean_score(&scores), ENGINE, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detail_rows() {
        let output = "([[10, 12], [90, 12], [90, 30], [10, 30]], 'Merhaba', 0.97)\n\
                      ([[np.int32(5), np.int32(40)], [np.int32(80), np.int32(40)]], \"it's\", np.float64(0.5))\n\
                      Using CPU. Note: This module is much faster with a GPU.\n";
        let rows = parse_rows(output);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ("Merhaba".to_string(), 0.97));
        assert_eq!(rows[1], ("it's".to_string(), 0.5));
    }

    #[test]
    fn test_language_mapping() {
        assert_eq!(easyocr_lang(None), "tr");
        assert_eq!(easyocr_lang(Some("zh")), "ch_sim");
        assert_eq!(easyocr_lang(Some("en")), "en");
    }
}
