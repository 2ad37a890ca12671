// Engine auto-selection from a cheap pilot run on the first page
//
// Only a top-left crop of page one is scored, so later pages with different
// scan quality are not represented. The pick is an estimate.
use image::{DynamicImage, GenericImageView};
use log::{debug, info};
use std::sync::Arc;

use super::adapter::EngineConfig;
use super::outcome::RecognitionOutcome;
use super::registry::AdapterRegistry;
use super::runner::{run_engine, Budget, EngineInput};
use crate::config::IngestConfig;
use crate::types::{IngestError, Result};

/// Scoring knobs for the pilot run
#[derive(Debug, Clone)]
pub struct PilotSettings {
    pub max_side: u32,
    pub text_window: usize,
    pub bonus_chars: String,
    pub bonus: f32,
}

impl PilotSettings {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            max_side: config.pilot_max_side,
            text_window: config.pilot_text_window,
            bonus_chars: config.script_bonus_chars.clone(),
            bonus: config.script_bonus,
        }
    }

    /// Confidence plus the script bonus when the leading text window holds
    /// any bonus character.
    pub fn score(&self, outcome: &RecognitionOutcome) -> f32 {
        let has_script_char = outcome
            .text()
            .chars()
            .take(self.text_window)
            .any(|ch| self.bonus_chars.contains(ch));
        if has_script_char {
            outcome.mean_confidence() + self.bonus
        } else {
            outcome.mean_confidence()
        }
    }
}

/// Top-left crop of the first image, at most `max_side` on each side
pub fn pilot_crop(images: &[DynamicImage], max_side: u32) -> Vec<DynamicImage> {
    images
        .first()
        .map(|image| {
            let (width, height) = image.dimensions();
            image.crop_imm(0, 0, width.min(max_side), height.min(max_side))
        })
        .into_iter()
        .collect()
}

/// Picks the candidate with the strictly highest pilot score; ties keep the
/// earlier candidate. Never fails once candidates are non-empty: if every
/// pilot errors the first candidate is returned.
pub async fn auto_select_engine(
    registry: &Arc<AdapterRegistry>,
    images: &[DynamicImage],
    candidates: &[String],
    settings: &PilotSettings,
    config: &Arc<EngineConfig>,
    budget: &Budget,
) -> Result<String> {
    let first = candidates
        .first()
        .ok_or_else(|| IngestError::InvalidConfig("no pilot candidates".to_string()))?;

    let pilot = Arc::new(pilot_crop(images, settings.max_side));
    let mut best: Option<(&String, f32)> = None;

    for name in candidates {
        if budget.expired() {
            debug!("pilot budget exhausted before {}", name);
            break;
        }
        let input = EngineInput::images(pilot.clone());
        match run_engine(registry.clone(), name, input, config.clone(), budget).await {
            Ok(outcome) => {
                let score = settings.score(&outcome);
                debug!("pilot {} scored {:.3}", name, score);
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((name, score));
                }
            }
            Err(e) => debug!("pilot {} skipped: {}", name, e),
        }
    }

    let chosen = best.map(|(name, _)| name).unwrap_or(first).clone();
    info!("auto-selected engine: {}", chosen);
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::outcome::Metadata;
    use image::RgbImage;

    fn settings() -> PilotSettings {
        PilotSettings::from_config(&IngestConfig::default())
    }

    #[test]
    fn test_pilot_crop_bounds() {
        let big = DynamicImage::ImageRgb8(RgbImage::new(2000, 300));
        let small = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        let crop = pilot_crop(&[big, small], 512);
        assert_eq!(crop.len(), 1);
        assert_eq!(crop[0].dimensions(), (512, 300));

        assert!(pilot_crop(&[], 512).is_empty());
    }

    #[test]
    fn test_script_bonus() {
        let plain = RecognitionOutcome::new("plain text", 0.6, "a", Metadata::new());
        let accented = RecognitionOutcome::new("b çğöşü", 0.6, "b", Metadata::new());
        assert!((settings().score(&plain) - 0.6).abs() < 1e-6);
        assert!((settings().score(&accented) - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_script_bonus_only_inspects_leading_window() {
        let mut text = "x".repeat(512);
        text.push('ş');
        let late = RecognitionOutcome::new(text, 0.5, "a", Metadata::new());
        assert!((settings().score(&late) - 0.5).abs() < 1e-6);
    }
}
