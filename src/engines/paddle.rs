// PaddleOCR adapter - PP-OCR detection + recognition models through oar-ocr
#![cfg_attr(not(feature = "paddle"), allow(dead_code))]
use std::path::{Path, PathBuf};

use crate::recognition::{EngineConfig, RecognizerAdapter};
use crate::types::Result;

const ENGINE: &str = "paddle";
const DET_MODEL: &str = "ppocrv4_mobile_det.onnx";
const REC_MODEL: &str = "ppocrv4_mobile_rec.onnx";
const CHAR_DICT: &str = "ppocr_keys_v1.txt";
const CLS_MODEL: &str = "ppocr_textline_ori.onnx";
/// Language of the recognition model kept at the top of the models directory
const BASE_LANG: &str = "ch";

/// Model files for one recognition language.
///
/// Detection and the optional text-line orientation classifier are shared;
/// recognition model and dictionary live in `<models_dir>/<lang>/`, except for
/// the base Chinese/English model at the top level. Each path can be
/// overridden per call with `det_model`, `rec_model`, `dict` and `cls_model`.
#[derive(Debug, Clone, PartialEq)]
struct ModelPaths {
    lang: String,
    detection: PathBuf,
    recognition: PathBuf,
    dictionary: PathBuf,
    orientation: Option<PathBuf>,
}

impl ModelPaths {
    fn resolve(models_dir: &Path, lang: &str) -> Self {
        let rec_dir = if lang == BASE_LANG {
            models_dir.to_path_buf()
        } else {
            models_dir.join(lang)
        };
        let orientation = models_dir.join(CLS_MODEL);
        Self {
            lang: lang.to_string(),
            detection: models_dir.join(DET_MODEL),
            recognition: rec_dir.join(REC_MODEL),
            dictionary: rec_dir.join(CHAR_DICT),
            orientation: orientation.exists().then_some(orientation),
        }
    }

    fn for_config(models_dir: &Path, config: &EngineConfig) -> Self {
        let resolved = Self::resolve(models_dir, &paddle_lang(config.lang()));
        let pick = |key: &str, default: PathBuf| config.get_str(key).map(PathBuf::from).unwrap_or(default);
        Self {
            detection: pick("det_model", resolved.detection),
            recognition: pick("rec_model", resolved.recognition),
            dictionary: pick("dict", resolved.dictionary),
            orientation: config.get_str("cls_model").map(PathBuf::from).or(resolved.orientation),
            lang: resolved.lang,
        }
    }

    fn missing(&self) -> Option<&Path> {
        [&self.detection, &self.recognition, &self.dictionary]
            .into_iter()
            .chain(self.orientation.as_ref())
            .find(|path| !path.exists())
            .map(PathBuf::as_path)
    }
}

/// PaddleOCR's name for a canonical language code
fn paddle_lang(lang: Option<&str>) -> String {
    match lang {
        None | Some("tr") => "turkish".to_string(),
        Some("zh") => "ch".to_string(),
        Some("de") => "german".to_string(),
        Some("fr") => "french".to_string(),
        Some("ja") => "japan".to_string(),
        Some("ko") => "korean".to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(feature = "paddle")]
pub fn create(models_dir: &Path) -> Result<Box<dyn RecognizerAdapter>> {
    let detection = models_dir.join(DET_MODEL);
    if !detection.exists() {
        return Err(crate::types::IngestError::unavailable(
            ENGINE,
            format!("model file {} not found", detection.display()),
        ));
    }
    Ok(Box::new(backend::PaddleAdapter::new(models_dir.to_path_buf())))
}

#[cfg(not(feature = "paddle"))]
pub fn create(_models_dir: &Path) -> Result<Box<dyn RecognizerAdapter>> {
    Err(crate::types::IngestError::unavailable(
        ENGINE,
        "built without the `paddle` feature",
    ))
}

#[cfg(feature = "paddle")]
mod backend {
    use image::DynamicImage;
    use log::debug;
    use oar_ocr::core::config::{OrtExecutionProvider, OrtSessionConfig};
    use oar_ocr::oarocr::OAROCRBuilder;
    use serde_json::Value;
    use std::path::PathBuf;
    use std::time::Instant;

    use super::{ModelPaths, ENGINE};
    use crate::engines::{device_label, run_metadata};
    use crate::recognition::outcome::mean_score;
    use crate::recognition::{EngineConfig, RecognitionOutcome, RecognizerAdapter};
    use crate::types::{IngestError, Result};

    /// CUDA first with CPU as the fallback provider; `None` keeps oar-ocr's CPU default.
    pub(super) fn session_config(use_gpu: bool) -> Option<OrtSessionConfig> {
        use_gpu.then(|| {
            OrtSessionConfig::new().with_execution_providers(vec![
                OrtExecutionProvider::CUDA {
                    device_id: Some(0),
                    gpu_mem_limit: None,
                    arena_extend_strategy: None,
                    cudnn_conv_algo_search: None,
                    cudnn_conv_use_max_workspace: None,
                },
                OrtExecutionProvider::CPU,
            ])
        })
    }

    pub struct PaddleAdapter {
        models_dir: PathBuf,
    }

    impl PaddleAdapter {
        pub(super) fn new(models_dir: PathBuf) -> Self {
            Self { models_dir }
        }
    }

    impl RecognizerAdapter for PaddleAdapter {
        fn name(&self) -> &str {
            ENGINE
        }

        fn supports_pdf(&self) -> bool {
            false
        }

        fn supports_image(&self) -> bool {
            true
        }

        fn recognize_images(&mut self, images: &[DynamicImage], config: &EngineConfig) -> Result<RecognitionOutcome> {
            let started = Instant::now();
            let models = ModelPaths::for_config(&self.models_dir, config);
            if let Some(missing) = models.missing() {
                return Err(IngestError::unavailable(
                    ENGINE,
                    format!("{} model file {} not found", models.lang, missing.display()),
                ));
            }

            let mut builder = OAROCRBuilder::new(
                models.detection.clone(),
                models.recognition.clone(),
                models.dictionary.clone(),
            );
            if let Some(orientation) = &models.orientation {
                builder = builder.with_text_line_orientation_classification(orientation.clone());
            }
            let on_gpu = config.use_gpu() && cfg!(feature = "cuda");
            if let Some(session) = session_config(on_gpu) {
                builder = builder.ort_session(session);
            }
            let ocr = builder
                .build()
                .map_err(|e| IngestError::engine_failed(ENGINE, e))?;

            let mut texts = Vec::new();
            let mut scores = Vec::new();
            if !images.is_empty() {
                let batch = images.iter().map(DynamicImage::to_rgb8).collect();
                let results = ocr
                    .predict(batch)
                    .map_err(|e| IngestError::engine_failed(ENGINE, e))?;
                for result in results {
                    for region in result.text_regions {
                        let Some(text) = region.text else { continue };
                        texts.push(text.to_string());
                        if let Some(score) = region.confidence {
                            scores.push(score);
                        }
                    }
                }
            }
            debug!(
                "paddle ({}) recognized {} regions over {} pages",
                models.lang,
                texts.len(),
                images.len()
            );

            let mut metadata = run_metadata(started, Some(images.len()));
            metadata.insert("lang".to_string(), Value::from(models.lang.clone()));
            metadata.insert("device".to_string(), Value::from(device_label(on_gpu)));
            metadata.insert("angle_cls".to_string(), Value::Bool(models.orientation.is_some()));
            Ok(RecognitionOutcome::new(texts.join("\n"), mean_score(&scores), ENGINE, metadata))
        }
    }
}
