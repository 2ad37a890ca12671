// Tesseract adapter - drives the tesseract CLI and reads its TSV output
//
// tesseract <page.png> stdout -l <lang> tsv
// TSV columns: level page_num block_num par_num line_num word_num left top width height conf text
use image::DynamicImage;
use log::debug;
use serde_json::Value;
use std::process::Command;
use std::time::Instant;

use super::{require_command, run_metadata, temp_workdir, write_pages};
use crate::command::run_to_string;
use crate::recognition::outcome::mean_score;
use crate::recognition::{EngineConfig, RecognitionOutcome, RecognizerAdapter};
use crate::types::{IngestError, Result};

const ENGINE: &str = "tesseract";
const DEFAULT_LANG: &str = "tur";

pub struct TesseractAdapter;

pub fn create() -> Result<Box<dyn RecognizerAdapter>> {
    require_command(ENGINE, ENGINE)?;
    Ok(Box::new(TesseractAdapter))
}

/// Canonical language code to tesseract's traineddata name
fn tesseract_lang(lang: Option<&str>) -> String {
    match lang {
        None => DEFAULT_LANG.to_string(),
        Some("tr") => "tur".to_string(),
        Some("en") => "eng".to_string(),
        Some("de") => "deu".to_string(),
        Some("fr") => "fra".to_string(),
        Some("es") => "spa".to_string(),
        Some("it") => "ita".to_string(),
        Some("pt") => "por".to_string(),
        Some("nl") => "nld".to_string(),
        Some("ru") => "rus".to_string(),
        Some("ar") => "ara".to_string(),
        Some("zh") => "chi_sim".to_string(),
        Some("ja") => "jpn".to_string(),
        Some("ko") => "kor".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Text and word confidences (0-100) of one page
#[derive(Debug, Default, PartialEq)]
struct TsvPage {
    text: String,
    confidences: Vec<f32>,
}

fn parse_tsv(tsv: &str) -> TsvPage {
    let mut lines: Vec<((u32, u32, u32), Vec<String>)> = Vec::new();
    let mut confidences = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let word = cols[11].trim();
        if word.is_empty() {
            continue;
        }
        if let Ok(conf) = cols[10].trim().parse::<f32>() {
            if conf >= 0.0 {
                confidences.push(conf);
            }
        }
        let key = (
            cols[2].parse().unwrap_or(0),
            cols[3].parse().unwrap_or(0),
            cols[4].parse().unwrap_or(0),
        );
        match lines.last_mut() {
            Some((last, words)) if *last == key => words.push(word.to_string()),
            _ => lines.push((key, vec![word.to_string()])),
        }
    }

    TsvPage {
        text: lines
            .into_iter()
            .map(|(_, words)| words.join(" "))
            .collect::<Vec<_>>()
            .join("\n"),
        confidences,
    }
}

impl RecognizerAdapter for TesseractAdapter {
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
        let lang = tesseract_lang(config.lang());
        let workdir = temp_workdir(ENGINE)?;
        let pages = write_pages(ENGINE, workdir.path(), images)?;

        let mut texts = Vec::with_capacity(pages.len());
        let mut page_scores = Vec::with_capacity(pages.len());
        for page in &pages {
            let mut command = Command::new(ENGINE);
            command.arg(page).arg("stdout").arg("-l").arg(&lang).arg("tsv");
            let tsv = run_to_string(&mut command)
                .map_err(|e| IngestError::engine_failed(ENGINE, format!("{:#}", e)))?;
            let parsed = parse_tsv(&tsv);
            if !parsed.confidences.is_empty() {
                page_scores.push(mean_score(&parsed.confidences) / 100.0);
            }
            debug!("tesseract read {} words from {}", parsed.confidences.len(), page.display());
            texts.push(parsed.text);
        }

        let mut metadata = run_metadata(started, Some(images.len()));
        metadata.insert("lang".to_string(), Value::from(lang));
        Ok(RecognitionOutcome::new(
            texts.join("\n"),
            mean_score(&page_scores),
            ENGINE,
            metadata,
        ))
    }
}
