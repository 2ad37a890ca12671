// Merges a printed-text pass with a handwriting pass
use super::outcome::{IngestOutcome, Metadata, RecognitionOutcome};
use serde_json::Value;

/// Printed text, a newline, then handwriting text. Confidence is the higher
/// of the two passes since they cover disjoint content.
pub fn combine_passes(printed: IngestOutcome, htr: RecognitionOutcome) -> IngestOutcome {
    let printed_meta = printed.metadata_value();
    let printed_engine = printed.engine_used.unwrap_or_default();
    let printed_confidence = printed.confidence.unwrap_or(0.0);
    let (htr_text, htr_confidence, htr_engine, htr_meta) = htr.into_parts();

    let mut metadata = Metadata::new();
    metadata.insert("printed".to_string(), printed_meta);
    metadata.insert(
        "htr".to_string(),
        Value::Object(htr_meta.into_iter().collect()),
    );

    IngestOutcome {
        input_path: printed.input_path,
        used_recognition: true,
        engine_used: Some(format!("{}+{}", printed_engine, htr_engine)),
        confidence: Some(printed_confidence.max(htr_confidence)),
        text: format!("{}\n{}", printed.text, htr_text),
        metadata,
        attempts: printed.attempts,
    }
}
