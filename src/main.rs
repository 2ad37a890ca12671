// ocr-ingest CLI - ingest a PDF or page images and print a JSON summary
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image::DynamicImage;
use log::info;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ocr_ingest::{
    DocumentOptions, EngineConfig, EngineSelection, HandwritingOptions, ImageOptions,
    IngestConfig, IngestOutcome, IngestPipeline,
};

#[derive(Parser)]
#[command(name = "ocr-ingest")]
#[command(about = "Ingest PDFs and page images with embedded text or OCR/HTR engines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a PDF file
    Pdf {
        /// Path to PDF
        path: PathBuf,
        /// Skip embedded text and force recognition
        #[arg(long)]
        prefer_ocr: bool,
        /// Rasterization resolution
        #[arg(long)]
        dpi: Option<u32>,
        /// First page to process (1-based)
        #[arg(long)]
        first_page: Option<u32>,
        /// Last page to process (1-based, inclusive)
        #[arg(long)]
        last_page: Option<u32>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Ingest a single image or a directory of .png pages
    Image {
        /// Path to image file or directory of images
        path: PathBuf,
        /// Add a handwriting pass after printed-text recognition
        #[arg(long)]
        enable_htr: bool,
        /// Engine for the handwriting pass
        #[arg(long, default_value = "trocr")]
        htr_engine: String,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// paddle|tesseract|easyocr|doctr|trocr|donut|nougat|auto
    #[arg(long, default_value = "auto")]
    engine: String,
    /// Language hint for OCR engines (e.g. turkish|tr|multilingual)
    #[arg(long)]
    ocr_lang: Option<String>,
    /// Minimum mean confidence to accept an engine's result
    #[arg(long)]
    confidence_threshold: Option<f32>,
    /// Engine to try after the selected one (repeatable)
    #[arg(long = "fallback")]
    fallbacks: Vec<String>,
    /// Do not append the default fallback engines
    #[arg(long)]
    no_default_fallbacks: bool,
    /// Overall time budget in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Pipeline config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the JSON summary here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

impl CommonArgs {
    fn pipeline_config(&self) -> Result<IngestConfig> {
        let mut config = match &self.config {
            Some(path) => IngestConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => IngestConfig::discover().context("loading config")?,
        };
        if self.no_default_fallbacks {
            config.append_default_fallbacks = false;
        }
        if self.timeout_secs.is_some() {
            config.timeout_secs = self.timeout_secs;
        }
        Ok(config)
    }

    fn engine_config(&self) -> EngineConfig {
        let config = EngineConfig::new();
        match &self.ocr_lang {
            Some(lang) => config.with("lang", lang.as_str()),
            None => config,
        }
    }

    fn fallback_order(&self) -> Option<Vec<String>> {
        if self.fallbacks.is_empty() {
            None
        } else {
            Some(self.fallbacks.clone())
        }
    }
}

fn load_images(path: &Path) -> Result<Vec<DynamicImage>> {
    let files = if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        let mut files: Vec<PathBuf> = std::fs::read_dir(path)
            .with_context(|| format!("reading {}", path.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("png")))
            .collect();
        files.sort();
        files
    };
    if files.is_empty() {
        anyhow::bail!("no .png images found in {}", path.display());
    }
    files
        .iter()
        .map(|file| image::open(file).with_context(|| format!("opening {}", file.display())))
        .collect()
}

fn summary(input: &Path, outcome: &IngestOutcome) -> serde_json::Value {
    json!({
        "input_path": input,
        "used_ocr": outcome.used_recognition,
        "engine": outcome.engine_used,
        "ocr_confidence": outcome.confidence,
        "text_len": outcome.text.chars().count(),
        "text": outcome.text,
        "metadata": outcome.metadata,
        "attempts": outcome.attempts,
    })
}

fn emit(payload: &serde_json::Value, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(payload)?;
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            info!("wrote summary to {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Pdf {
            path,
            prefer_ocr,
            dpi,
            first_page,
            last_page,
            common,
        } => {
            let pipeline = IngestPipeline::new(common.pipeline_config()?);
            let options = DocumentOptions {
                engine: EngineSelection::from(common.engine.as_str()),
                prefer_ocr,
                dpi,
                first_page,
                last_page,
                confidence_threshold: common.confidence_threshold,
                fallback_order: common.fallback_order(),
                pilot_candidates: None,
                engine_config: common.engine_config(),
            };
            let outcome = pipeline.ingest_document(&path, options).await?;
            emit(&summary(&path, &outcome), common.output.as_deref())
        }
        Commands::Image {
            path,
            enable_htr,
            htr_engine,
            common,
        } => {
            let pipeline = IngestPipeline::new(common.pipeline_config()?);
            let images = load_images(&path)?;
            info!("loaded {} images from {}", images.len(), path.display());
            let outcome = if enable_htr {
                let options = HandwritingOptions {
                    enable_htr,
                    printed_engine: common.engine.clone(),
                    htr_engine,
                    confidence_threshold: common.confidence_threshold,
                    fallback_order: common.fallback_order(),
                    engine_config: common.engine_config(),
                };
                pipeline.ingest_with_handwriting(images, options).await?
            } else {
                let options = ImageOptions {
                    engine: EngineSelection::from(common.engine.as_str()),
                    confidence_threshold: common.confidence_threshold,
                    fallback_order: common.fallback_order(),
                    pilot_candidates: None,
                    engine_config: common.engine_config(),
                };
                pipeline.ingest_images(images, options).await?
            };
            emit(&summary(&path, &outcome), common.output.as_deref())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
