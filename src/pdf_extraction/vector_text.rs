// Vector-text gate: skip recognition when the PDF already carries enough text
//
// pdftotext is called with -layout to preserve formatting:
// pdftotext [-f first] [-l last] -layout [pdf_path] -
// When poppler is missing, lopdf reads the text objects directly.
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::Path;
use std::process::Command;

use super::lopdf_helper;
use crate::command::{command_available, run_to_string};

/// Source of text embedded in a document. Any error means "no vector text".
pub trait VectorTextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String>;
}

/// pdftotext with a lopdf fallback
#[derive(Debug, Clone, Default)]
pub struct PdfTextExtractor {
    pub first_page: Option<u32>,
    pub last_page: Option<u32>,
}

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn extract_with_pdftotext(&self, path: &Path) -> Result<String> {
        let mut command = Command::new("pdftotext");
        if let Some(first) = self.first_page {
            command.arg("-f").arg(first.to_string());
        }
        if let Some(last) = self.last_page {
            command.arg("-l").arg(last.to_string());
        }
        command.arg("-layout").arg(path).arg("-");
        run_to_string(&mut command).with_context(|| format!("pdftotext on {}", path.display()))
    }
}

impl VectorTextExtractor for PdfTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        if command_available("pdftotext") {
            self.extract_with_pdftotext(path)
        } else {
            debug!("pdftotext not found, reading text with lopdf");
            lopdf_helper::extract_text(path, self.first_page, self.last_page)
        }
    }
}

/// Embedded text counts as sufficient when its trimmed length reaches `min_len`.
pub fn is_sufficient_vector_text(text: &str, min_len: usize) -> bool {
    if text.is_empty() {
        return false;
    }
    text.trim().chars().count() >= min_len
}

/// Decides whether recognition can be skipped for a document
#[derive(Debug, Clone, Copy)]
pub struct VectorTextGate {
    pub min_len: usize,
}

impl VectorTextGate {
    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }

    /// Returns the embedded text when it is sufficient. `prefer_ocr` skips
    /// extraction entirely.
    pub fn check(
        &self,
        extractor: &dyn VectorTextExtractor,
        path: &Path,
        prefer_ocr: bool,
    ) -> Option<String> {
        if prefer_ocr {
            debug!("vector text skipped: recognition forced");
            return None;
        }
        let text = match extractor.extract(path) {
            Ok(text) => text,
            Err(e) => {
                debug!("vector text unavailable for {}: {}", path.display(), e);
                return None;
            }
        };
        if is_sufficient_vector_text(&text, self.min_len) {
            info!("using embedded text of {} ({} chars)", path.display(), text.chars().count());
            Some(text)
        } else {
            debug!("embedded text too short ({} chars)", text.trim().chars().count());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(String);

    impl VectorTextExtractor for Fixed {
        fn extract(&self, _path: &Path) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl VectorTextExtractor for Broken {
        fn extract(&self, _path: &Path) -> Result<String> {
            anyhow::bail!("not a pdf")
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl VectorTextExtractor for Counting {
        fn extract(&self, _path: &Path) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("x".repeat(500))
        }
    }

    #[test]
    fn test_sufficiency_threshold() {
        assert!(!is_sufficient_vector_text("", 64));
        assert!(!is_sufficient_vector_text(&"a".repeat(63), 64));
        assert!(is_sufficient_vector_text(&"a".repeat(64), 64));
        // surrounding whitespace does not count
        let padded = format!("   {}\n\n\n", "a".repeat(63));
        assert!(!is_sufficient_vector_text(&padded, 64));
        // length is measured in characters, not bytes
        assert!(!is_sufficient_vector_text(&"ş".repeat(40), 64));
        assert!(is_sufficient_vector_text(&"ş".repeat(64), 64));
    }

    #[test]
    fn test_gate_accepts_long_text() {
        let gate = VectorTextGate::new(64);
        let text = "some vector text".repeat(10);
        assert_eq!(gate.check(&Fixed(text.clone()), Path::new("a.pdf"), false), Some(text));
    }

    #[test]
    fn test_gate_rejects_short_and_broken() {
        let gate = VectorTextGate::new(64);
        assert_eq!(gate.check(&Fixed("CONFIDENTIAL".to_string()), Path::new("a.pdf"), false), None);
        assert_eq!(gate.check(&Broken, Path::new("a.pdf"), false), None);
    }

    #[test]
    fn test_prefer_ocr_skips_extraction() {
        let gate = VectorTextGate::new(64);
        let extractor = Counting::default();
        assert_eq!(gate.check(&extractor, Path::new("a.pdf"), true), None);
        assert_eq!(extractor.0.load(Ordering::SeqCst), 0);
        assert!(gate.check(&extractor, Path::new("a.pdf"), false).is_some());
        assert_eq!(extractor.0.load(Ordering::SeqCst), 1);
    }
}
