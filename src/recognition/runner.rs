// Runs one engine call off the async runtime, bounded by the overall budget
use image::DynamicImage;
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::adapter::{EngineConfig, RecognizerAdapter};
use super::outcome::RecognitionOutcome;
use super::registry::AdapterRegistry;
use crate::types::{IngestError, Result};

/// Overall time allowance for one pipeline invocation
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    limit: Option<Duration>,
}

impl Budget {
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.limit.map(|limit| limit.saturating_sub(self.elapsed()))
    }

    pub fn expired(&self) -> bool {
        matches!(self.remaining(), Some(left) if left.is_zero())
    }

    pub fn timeout_error(&self) -> IngestError {
        IngestError::Timeout {
            elapsed: self.elapsed(),
            attempts: Vec::new(),
        }
    }
}

/// What an engine is asked to read
#[derive(Debug, Clone)]
pub struct EngineInput {
    pub pdf_path: Option<PathBuf>,
    pub images: Arc<Vec<DynamicImage>>,
}

impl EngineInput {
    pub fn images(images: Arc<Vec<DynamicImage>>) -> Self {
        Self {
            pdf_path: None,
            images,
        }
    }

    pub fn document(pdf_path: PathBuf, images: Arc<Vec<DynamicImage>>) -> Self {
        Self {
            pdf_path: Some(pdf_path),
            images,
        }
    }
}

// PDF first when both the adapter and the input allow it, images otherwise
fn recognize_with(
    adapter: &mut dyn RecognizerAdapter,
    input: &EngineInput,
    config: &EngineConfig,
) -> Result<RecognitionOutcome> {
    if let Some(path) = input.pdf_path.as_deref() {
        if adapter.supports_pdf() {
            match adapter.recognize_pdf(path, config) {
                Err(IngestError::UnsupportedOperation { .. }) if adapter.supports_image() => {
                    debug!("{} rejected pdf input, retrying with page images", adapter.name());
                }
                other => return other,
            }
        }
    }
    if !adapter.supports_image() {
        return Err(IngestError::UnsupportedOperation {
            engine: adapter.name().to_string(),
            operation: "image input",
        });
    }
    adapter.recognize_images(&input.images, config)
}

/// Builds the adapter and runs it on a blocking thread. An expired budget
/// abandons the call and reports `Timeout`; the thread finishes on its own.
pub async fn run_engine(
    registry: Arc<AdapterRegistry>,
    name: &str,
    input: EngineInput,
    config: Arc<EngineConfig>,
    budget: &Budget,
) -> Result<RecognitionOutcome> {
    if budget.expired() {
        return Err(budget.timeout_error());
    }

    let engine = name.to_string();
    let handle = tokio::task::spawn_blocking(move || {
        let mut adapter = registry.build(&engine)?;
        recognize_with(adapter.as_mut(), &input, &config)
    });

    let joined = match budget.remaining() {
        Some(left) => match tokio::time::timeout(left, handle).await {
            Ok(joined) => joined,
            Err(_) => return Err(budget.timeout_error()),
        },
        None => handle.await,
    };

    joined.map_err(|e| IngestError::engine_failed(name, format!("engine task aborted: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::outcome::Metadata;
    use std::path::Path;

    struct Both {
        pdf_fails: bool,
    }

    impl RecognizerAdapter for Both {
        fn name(&self) -> &str {
            "both"
        }
        fn supports_pdf(&self) -> bool {
            true
        }
        fn supports_image(&self) -> bool {
            true
        }
        fn recognize_pdf(&mut self, _path: &Path, _config: &EngineConfig) -> Result<RecognitionOutcome> {
            if self.pdf_fails {
                return Err(IngestError::UnsupportedOperation {
                    engine: "both".into(),
                    operation: "pdf input",
                });
            }
            Ok(RecognitionOutcome::new("from pdf", 0.9, "both", Metadata::new()))
        }
        fn recognize_images(
            &mut self,
            _images: &[DynamicImage],
            _config: &EngineConfig,
        ) -> Result<RecognitionOutcome> {
            Ok(RecognitionOutcome::new("from images", 0.8, "both", Metadata::new()))
        }
    }

    fn document_input() -> EngineInput {
        EngineInput::document(PathBuf::from("doc.pdf"), Arc::new(Vec::new()))
    }

    #[test]
    fn test_pdf_preferred_when_path_available() {
        let mut adapter = Both { pdf_fails: false };
        let outcome = recognize_with(&mut adapter, &document_input(), &EngineConfig::new()).unwrap();
        assert_eq!(outcome.text(), "from pdf");

        let images_only = EngineInput::images(Arc::new(Vec::new()));
        let outcome = recognize_with(&mut adapter, &images_only, &EngineConfig::new()).unwrap();
        assert_eq!(outcome.text(), "from images");
    }

    #[test]
    fn test_unsupported_pdf_falls_back_to_images() {
        let mut adapter = Both { pdf_fails: true };
        let outcome = recognize_with(&mut adapter, &document_input(), &EngineConfig::new()).unwrap();
        assert_eq!(outcome.text(), "from images");
    }

    #[test]
    fn test_budget() {
        assert!(!Budget::unlimited().expired());
        assert!(Budget::new(Some(Duration::ZERO)).expired());
        assert!(!Budget::new(Some(Duration::from_secs(60))).expired());
    }
}
