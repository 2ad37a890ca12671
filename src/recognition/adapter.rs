// Recognizer adapter contract and the opaque per-engine configuration record
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use super::outcome::RecognitionOutcome;
use crate::config::normalize_language;
use crate::types::{IngestError, Result};

/// A recognition backend that turns a PDF or page images into text.
///
/// Each method is only meaningful when the matching capability flag is set;
/// the default bodies fail with `UnsupportedOperation`.
pub trait RecognizerAdapter: Send {
    fn name(&self) -> &str;

    fn supports_pdf(&self) -> bool;

    fn supports_image(&self) -> bool;

    fn recognize_pdf(&mut self, _path: &Path, _config: &EngineConfig) -> Result<RecognitionOutcome> {
        Err(IngestError::UnsupportedOperation {
            engine: self.name().to_string(),
            operation: "pdf input",
        })
    }

    fn recognize_images(
        &mut self,
        _images: &[DynamicImage],
        _config: &EngineConfig,
    ) -> Result<RecognitionOutcome> {
        Err(IngestError::UnsupportedOperation {
            engine: self.name().to_string(),
            operation: "image input",
        })
    }
}

/// Per-engine settings passed through untouched, apart from `lang` and `use_gpu`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineConfig(Map<String, Value>);

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn lang(&self) -> Option<&str> {
        self.get_str("lang")
    }

    pub fn use_gpu(&self) -> bool {
        self.get_bool("use_gpu").unwrap_or(false)
    }

    pub fn model(&self) -> Option<&str> {
        self.get_str("model")
    }

    /// Normalizes an existing `lang`, otherwise fills it from `fallback`.
    /// `use_gpu` is only set when absent.
    pub(crate) fn prepared(&self, fallback_lang: Option<&str>, use_gpu: bool) -> Self {
        let mut config = self.clone();
        let lang = config.lang().or(fallback_lang).map(normalize_language);
        if let Some(lang) = lang {
            config.0.insert("lang".to_string(), Value::String(lang));
        }
        if !config.0.contains_key("use_gpu") {
            config.0.insert("use_gpu".to_string(), Value::Bool(use_gpu));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PdfOnly;

    impl RecognizerAdapter for PdfOnly {
        fn name(&self) -> &str {
            "pdf-only"
        }
        fn supports_pdf(&self) -> bool {
            true
        }
        fn supports_image(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_unsupported_method_fails() {
        let mut adapter = PdfOnly;
        let err = adapter
            .recognize_images(&[], &EngineConfig::new())
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedOperation { operation: "image input", .. }));
    }

    #[test]
    fn test_prepared_injects_normalized_language() {
        let config = EngineConfig::new().prepared(Some("Turkish"), true);
        assert_eq!(config.lang(), Some("tr"));
        assert!(config.use_gpu());

        let explicit = EngineConfig::new()
            .with("lang", "english")
            .with("use_gpu", false)
            .prepared(Some("turkish"), true);
        assert_eq!(explicit.lang(), Some("en"));
        assert!(!explicit.use_gpu());
    }

    #[test]
    fn test_prepared_keeps_unknown_keys() {
        let config = EngineConfig::new().with("det_arch", "db_resnet50").prepared(None, false);
        assert_eq!(config.get_str("det_arch"), Some("db_resnet50"));
        assert_eq!(config.lang(), None);
    }
}
