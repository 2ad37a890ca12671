// Recognition results: per-engine outcome and the pipeline's final outcome
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::types::EngineAttempt;

/// Ordered metadata attached to outcomes (elapsed time, page count, device, ...)
pub type Metadata = IndexMap<String, Value>;

/// Result of one adapter invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionOutcome {
    text: String,
    mean_confidence: f32,
    engine_name: String,
    metadata: Metadata,
}

impl RecognitionOutcome {
    /// Builds an outcome, clamping the confidence into [0, 1]. NaN counts as 0.
    pub fn new(
        text: impl Into<String>,
        mean_confidence: f32,
        engine_name: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            text: text.into(),
            mean_confidence: clamp_confidence(mean_confidence),
            engine_name: engine_name.into(),
            metadata,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mean_confidence(&self) -> f32 {
        self.mean_confidence
    }

    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn into_parts(self) -> (String, f32, String, Metadata) {
        (self.text, self.mean_confidence, self.engine_name, self.metadata)
    }
}

pub fn clamp_confidence(raw: f32) -> f32 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

/// Mean of the given scores, 0.0 when empty
pub fn mean_score(scores: &[f32]) -> f32 {
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f32>() / scores.len() as f32
    }
}

/// The pipeline's final result, created once per invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub input_path: Option<PathBuf>,
    pub used_recognition: bool,
    pub engine_used: Option<String>,
    pub confidence: Option<f32>,
    pub text: String,
    pub metadata: Metadata,
    pub attempts: Vec<EngineAttempt>,
}

impl IngestOutcome {
    /// Outcome for a document whose embedded text was sufficient
    pub fn from_vector_text(input_path: PathBuf, text: String) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("vector".to_string(), Value::Bool(true));
        metadata.insert("chars".to_string(), Value::from(text.chars().count()));
        Self {
            input_path: Some(input_path),
            used_recognition: false,
            engine_used: None,
            confidence: None,
            text,
            metadata,
            attempts: Vec::new(),
        }
    }

    pub fn from_recognition(
        input_path: Option<PathBuf>,
        outcome: RecognitionOutcome,
        attempts: Vec<EngineAttempt>,
    ) -> Self {
        let (text, confidence, engine, metadata) = outcome.into_parts();
        Self {
            input_path,
            used_recognition: true,
            engine_used: Some(engine),
            confidence: Some(confidence),
            text,
            metadata,
            attempts,
        }
    }

    /// Metadata of this outcome as a JSON object, for nesting under another outcome
    pub fn metadata_value(&self) -> Value {
        Value::Object(self.metadata.clone().into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(RecognitionOutcome::new("", 1.7, "x", Metadata::new()).mean_confidence(), 1.0);
        assert_eq!(RecognitionOutcome::new("", -0.3, "x", Metadata::new()).mean_confidence(), 0.0);
        assert_eq!(RecognitionOutcome::new("", f32::NAN, "x", Metadata::new()).mean_confidence(), 0.0);
        assert_eq!(RecognitionOutcome::new("", 0.42, "x", Metadata::new()).mean_confidence(), 0.42);
    }

    #[test]
    fn test_vector_outcome_has_no_engine_or_confidence() {
        let outcome = IngestOutcome::from_vector_text(PathBuf::from("a.pdf"), "abc".to_string());
        assert!(!outcome.used_recognition);
        assert!(outcome.engine_used.is_none());
        assert!(outcome.confidence.is_none());
        assert_eq!(outcome.metadata["vector"], Value::Bool(true));
        assert_eq!(outcome.metadata["chars"], Value::from(3));
    }

    #[test]
    fn test_mean_score() {
        assert_eq!(mean_score(&[]), 0.0);
        assert!((mean_score(&[0.5, 1.0]) - 0.75).abs() < f32::EPSILON);
    }
}
