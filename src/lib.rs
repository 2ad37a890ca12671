// ocr-ingest - document ingestion: embedded text when present, OCR/HTR engines otherwise
pub mod command;
pub mod config;
pub mod engines;
pub mod pdf_extraction;
pub mod recognition;
pub mod types;

pub use config::IngestConfig;
pub use recognition::{
    AdapterRegistry, DocumentOptions, EngineConfig, EngineSelection, HandwritingOptions,
    ImageOptions, IngestOutcome, IngestPipeline, RecognitionOutcome, RecognizerAdapter,
};
pub use types::{AttemptFailure, EngineAttempt, IngestError, Result};
