// Configuration for the ingestion pipeline
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{IngestError, Result};

pub const CONFIG_ENV: &str = "OCR_INGEST_CONFIG";
pub const MODELS_ENV: &str = "OCR_INGEST_MODELS";
pub const DEFAULT_CONFIG_FILE: &str = "ingest.toml";

pub const DEFAULT_MIN_VECTOR_TEXT_LEN: usize = 64;
pub const DEFAULT_PILOT_MAX_SIDE: u32 = 512;
pub const DEFAULT_PILOT_TEXT_WINDOW: usize = 512;
pub const DEFAULT_SCRIPT_BONUS: f32 = 0.05;
pub const DEFAULT_SCRIPT_BONUS_CHARS: &str = "çğıöşüÇĞİÖŞÜ";
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;
pub const DEFAULT_DPI: u32 = 300;
pub const DEFAULT_ENGINES: [&str; 3] = ["paddle", "easyocr", "tesseract"];

/// Pipeline-level settings. Engine-specific knobs live in `EngineConfig`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    pub language: Option<String>,
    pub use_gpu: bool,
    pub min_vector_text_len: usize,
    pub pilot_max_side: u32,
    pub pilot_text_window: usize,
    pub script_bonus_chars: String,
    pub script_bonus: f32,
    pub pilot_candidates: Vec<String>,
    pub confidence_threshold: f32,
    pub dpi: u32,
    pub default_fallbacks: Vec<String>,
    pub append_default_fallbacks: bool,
    pub timeout_secs: Option<u64>,
    pub models_dir: PathBuf,
}

fn default_engines() -> Vec<String> {
    DEFAULT_ENGINES.iter().map(|s| s.to_string()).collect()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            language: None,
            use_gpu: true,
            min_vector_text_len: DEFAULT_MIN_VECTOR_TEXT_LEN,
            pilot_max_side: DEFAULT_PILOT_MAX_SIDE,
            pilot_text_window: DEFAULT_PILOT_TEXT_WINDOW,
            script_bonus_chars: DEFAULT_SCRIPT_BONUS_CHARS.to_string(),
            script_bonus: DEFAULT_SCRIPT_BONUS,
            pilot_candidates: default_engines(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            dpi: DEFAULT_DPI,
            default_fallbacks: default_engines(),
            append_default_fallbacks: true,
            timeout_secs: None,
            models_dir: PathBuf::from("./models"),
        }
    }
}

impl IngestConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: IngestConfig = toml::from_str(&content).map_err(|e| {
            IngestError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Config file from `OCR_INGEST_CONFIG`, else `ingest.toml` if present, else defaults.
    pub fn discover() -> Result<Self> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::load(local);
        }
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = env::var(MODELS_ENV) {
            self.models_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.confidence_threshold)?;
        if self.pilot_candidates.is_empty() {
            return Err(IngestError::InvalidConfig(
                "pilot_candidates must not be empty".to_string(),
            ));
        }
        if self.pilot_max_side == 0 {
            return Err(IngestError::InvalidConfig(
                "pilot_max_side must be positive".to_string(),
            ));
        }
        if self.dpi == 0 {
            return Err(IngestError::InvalidConfig("dpi must be positive".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

pub fn validate_threshold(threshold: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(IngestError::InvalidConfig(format!(
            "confidence threshold {} is outside [0, 1]",
            threshold
        )));
    }
    Ok(())
}

// Aliases accepted for the language hint, mapped to two-letter codes
const LANGUAGE_ALIASES: &[(&str, &str)] = &[
    ("turkish", "tr"),
    ("tur", "tr"),
    ("english", "en"),
    ("eng", "en"),
    ("german", "de"),
    ("deu", "de"),
    ("ger", "de"),
    ("french", "fr"),
    ("fra", "fr"),
    ("fre", "fr"),
    ("spanish", "es"),
    ("spa", "es"),
    ("italian", "it"),
    ("ita", "it"),
    ("portuguese", "pt"),
    ("por", "pt"),
    ("dutch", "nl"),
    ("nld", "nl"),
    ("russian", "ru"),
    ("rus", "ru"),
    ("arabic", "ar"),
    ("ara", "ar"),
    ("chinese", "zh"),
    ("ch", "zh"),
    ("chi_sim", "zh"),
    ("japanese", "ja"),
    ("jpn", "ja"),
    ("japan", "ja"),
    ("korean", "ko"),
    ("kor", "ko"),
];

/// Normalize a language hint to its canonical code. Unknown hints pass through lower-cased.
pub fn normalize_language(hint: &str) -> String {
    let lowered = hint.trim().to_lowercase();
    LANGUAGE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, code)| code.to_string())
        .unwrap_or(lowered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = IngestConfig::default();
        assert_eq!(config.min_vector_text_len, 64);
        assert_eq!(config.pilot_max_side, 512);
        assert_eq!(config.confidence_threshold, 0.6);
        assert_eq!(config.dpi, 300);
        assert_eq!(config.pilot_candidates, vec!["paddle", "easyocr", "tesseract"]);
        assert!(config.append_default_fallbacks);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "language = \"turkish\"").unwrap();
        writeln!(file, "append_default_fallbacks = false").unwrap();
        writeln!(file, "default_fallbacks = [\"tesseract\"]").unwrap();
        writeln!(file, "timeout_secs = 30").unwrap();

        let config = IngestConfig::load(file.path()).unwrap();
        assert_eq!(config.language.as_deref(), Some("turkish"));
        assert!(!config.append_default_fallbacks);
        assert_eq!(config.default_fallbacks, vec!["tesseract"]);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.min_vector_text_len, 64);
    }

    #[test]
    fn test_load_rejects_bad_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confidence_threshold = 1.5").unwrap();
        assert!(matches!(
            IngestConfig::load(file.path()),
            Err(IngestError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("Turkish"), "tr");
        assert_eq!(normalize_language("tr"), "tr");
        assert_eq!(normalize_language("tur"), "tr");
        assert_eq!(normalize_language(" ENG "), "en");
        assert_eq!(normalize_language("multilingual"), "multilingual");
    }
}
