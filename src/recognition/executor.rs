// Ordered multi-engine fallback with confidence thresholding
use log::{debug, info, warn};
use std::sync::Arc;

use super::adapter::EngineConfig;
use super::outcome::RecognitionOutcome;
use super::registry::AdapterRegistry;
use super::runner::{run_engine, Budget, EngineInput};
use crate::types::{AttemptFailure, EngineAttempt, IngestError, Result};

/// Distinct engine identifiers in the order they will be tried.
/// Computed once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateOrder(Vec<String>);

impl CandidateOrder {
    /// `primary`, then the caller's fallbacks, then the defaults when
    /// `append_defaults` is set. Duplicates keep their first position.
    pub fn build(
        primary: &str,
        fallback_order: Option<&[String]>,
        defaults: &[String],
        append_defaults: bool,
    ) -> Self {
        let mut order: Vec<String> = Vec::new();
        let tail: &[String] = if append_defaults { defaults } else { &[] };
        let names = std::iter::once(primary)
            .chain(fallback_order.unwrap_or_default().iter().map(String::as_str))
            .chain(tail.iter().map(String::as_str));
        for name in names {
            let name = name.to_lowercase();
            if !order.contains(&name) {
                order.push(name);
            }
        }
        Self(order)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of a fallback run that produced text
#[derive(Debug, Clone)]
pub struct Execution {
    pub outcome: RecognitionOutcome,
    pub attempts: Vec<EngineAttempt>,
    /// The outcome cleared the threshold
    pub accepted: bool,
    /// The budget ran out before every candidate was tried
    pub timed_out: bool,
}

/// Tries engines in order and returns the first outcome at or above
/// `threshold`. Otherwise the last successful outcome is returned as a
/// degraded result; with none, the call fails. Outcomes without text
/// count as failed attempts and are never kept.
pub async fn execute_with_fallback(
    registry: &Arc<AdapterRegistry>,
    order: &CandidateOrder,
    input: &EngineInput,
    config: &Arc<EngineConfig>,
    threshold: f32,
    budget: &Budget,
) -> Result<Execution> {
    let mut attempts: Vec<EngineAttempt> = Vec::new();
    let mut last_result: Option<RecognitionOutcome> = None;
    let mut timed_out = false;

    for name in order.as_slice() {
        if budget.expired() {
            timed_out = true;
            break;
        }
        debug!("trying engine {}", name);
        match run_engine(registry.clone(), name, input.clone(), config.clone(), budget).await {
            Ok(outcome) if outcome.text().trim().is_empty() => {
                debug!("engine {} returned no text", name);
                attempts.push(EngineAttempt::new(
                    name.as_str(),
                    AttemptFailure::EmptyText,
                    format!("no text at confidence {:.3}", outcome.mean_confidence()),
                ));
            }
            Ok(outcome) => {
                let confidence = outcome.mean_confidence();
                if confidence >= threshold {
                    info!("engine {} accepted with confidence {:.3}", name, confidence);
                    return Ok(Execution {
                        outcome,
                        attempts,
                        accepted: true,
                        timed_out: false,
                    });
                }
                debug!("engine {} below threshold ({:.3} < {:.3})", name, confidence, threshold);
                attempts.push(EngineAttempt::new(
                    name.as_str(),
                    AttemptFailure::BelowThreshold,
                    format!("confidence {:.3} below {:.3}", confidence, threshold),
                ));
                last_result = Some(outcome);
            }
            Err(IngestError::Timeout { elapsed, .. }) => {
                warn!("engine {} abandoned after {:?}", name, elapsed);
                attempts.push(EngineAttempt::new(
                    name.as_str(),
                    AttemptFailure::Timeout,
                    format!("overall timeout reached after {:?}", elapsed),
                ));
                timed_out = true;
                break;
            }
            Err(e) => {
                warn!("engine {} failed: {}", name, e);
                attempts.push(EngineAttempt::new(name.as_str(), e.attempt_failure(), e.to_string()));
            }
        }
    }

    match last_result {
        Some(outcome) => {
            warn!(
                "no engine reached {:.3}; keeping {} at {:.3}",
                threshold,
                outcome.engine_name(),
                outcome.mean_confidence()
            );
            Ok(Execution {
                outcome,
                attempts,
                accepted: false,
                timed_out,
            })
        }
        None if timed_out => Err(IngestError::Timeout {
            elapsed: budget.elapsed(),
            attempts,
        }),
        None => Err(IngestError::NoEngineSucceeded { attempts }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_order_appends_defaults_without_duplicates() {
        let defaults = names(&["paddle", "easyocr", "tesseract"]);
        let order = CandidateOrder::build("tesseract", None, &defaults, true);
        assert_eq!(order.as_slice(), names(&["tesseract", "paddle", "easyocr"]).as_slice());
    }

    #[test]
    fn test_order_with_caller_fallbacks() {
        let defaults = names(&["paddle", "easyocr", "tesseract"]);
        let fallback = names(&["doctr", "Paddle"]);
        let order = CandidateOrder::build("trocr", Some(fallback.as_slice()), &defaults, true);
        assert_eq!(
            order.as_slice(),
            names(&["trocr", "doctr", "paddle", "easyocr", "tesseract"]).as_slice()
        );
    }

    #[test]
    fn test_order_without_defaults() {
        let defaults = names(&["paddle", "easyocr", "tesseract"]);
        let fallback = names(&["tesseract"]);
        let order = CandidateOrder::build("tesseract", Some(fallback.as_slice()), &defaults, false);
        assert_eq!(order.as_slice(), names(&["tesseract"]).as_slice());
        assert_eq!(order.len(), 1);
    }
}
