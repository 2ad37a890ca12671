// Error and attempt types shared by the ingestion pipeline
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Why a single engine attempt did not produce the accepted result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptFailure {
    DependencyUnavailable,
    UnsupportedOperation,
    EngineFailed,
    Timeout,
    BelowThreshold,
    EmptyText,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AttemptFailure::DependencyUnavailable => "dependency unavailable",
            AttemptFailure::UnsupportedOperation => "unsupported operation",
            AttemptFailure::EngineFailed => "engine failed",
            AttemptFailure::Timeout => "timed out",
            AttemptFailure::BelowThreshold => "below threshold",
            AttemptFailure::EmptyText => "empty text",
        };
        f.write_str(label)
    }
}

/// One recorded engine attempt, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineAttempt {
    pub engine: String,
    pub failure: AttemptFailure,
    pub message: String,
}

impl EngineAttempt {
    pub fn new(engine: impl Into<String>, failure: AttemptFailure, message: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            failure,
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.engine, self.failure, self.message)
    }
}

fn summarize(attempts: &[EngineAttempt]) -> String {
    if attempts.is_empty() {
        return "no engines attempted".to_string();
    }
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("engine '{engine}' is not available: {reason}")]
    DependencyUnavailable { engine: String, reason: String },

    #[error("unknown engine: {0}")]
    UnknownEngine(String),

    #[error("engine '{engine}' does not support {operation}")]
    UnsupportedOperation { engine: String, operation: &'static str },

    #[error("engine '{engine}' failed: {message}")]
    EngineFailed { engine: String, message: String },

    #[error("rasterization failed: {0}")]
    RasterizationFailed(String),

    #[error("no recognition engine succeeded ({})", summarize(.attempts))]
    NoEngineSucceeded { attempts: Vec<EngineAttempt> },

    #[error("recognition timed out after {elapsed:?} ({})", summarize(.attempts))]
    Timeout {
        elapsed: Duration,
        attempts: Vec<EngineAttempt>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn engine_failed(engine: impl Into<String>, message: impl fmt::Display) -> Self {
        IngestError::EngineFailed {
            engine: engine.into(),
            message: message.to_string(),
        }
    }

    pub fn unavailable(engine: impl Into<String>, reason: impl fmt::Display) -> Self {
        IngestError::DependencyUnavailable {
            engine: engine.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify a per-engine error for the attempt log.
    pub fn attempt_failure(&self) -> AttemptFailure {
        match self {
            IngestError::DependencyUnavailable { .. } => AttemptFailure::DependencyUnavailable,
            IngestError::UnsupportedOperation { .. } => AttemptFailure::UnsupportedOperation,
            IngestError::Timeout { .. } => AttemptFailure::Timeout,
            _ => AttemptFailure::EngineFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_engine_message_lists_attempts() {
        let err = IngestError::NoEngineSucceeded {
            attempts: vec![
                EngineAttempt::new("paddle", AttemptFailure::DependencyUnavailable, "not built"),
                EngineAttempt::new("tesseract", AttemptFailure::EngineFailed, "exit status 1"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("paddle (dependency unavailable): not built"));
        assert!(msg.contains("tesseract (engine failed): exit status 1"));
    }

    #[test]
    fn test_attempt_failure_classification() {
        assert_eq!(
            IngestError::unavailable("x", "missing").attempt_failure(),
            AttemptFailure::DependencyUnavailable
        );
        assert_eq!(
            IngestError::UnsupportedOperation { engine: "x".into(), operation: "pdf input" }
                .attempt_failure(),
            AttemptFailure::UnsupportedOperation
        );
        assert_eq!(
            IngestError::engine_failed("x", "boom").attempt_failure(),
            AttemptFailure::EngineFailed
        );
    }
}
