// Donut adapter - OCR-free document transformer prompted for plain text
//
// Expects <models_dir>/donut/{encoder.onnx, decoder.onnx, tokenizer.json}.
// `task_prompt` selects the decoder prompt, `model` another model directory.
use std::path::Path;

use crate::recognition::RecognizerAdapter;
use crate::types::Result;

const ENGINE: &str = "donut";
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
const DEFAULT_TASK_PROMPT: &str = "<s_docvqa><s_question>extract_text</s_question><s_answer>";

#[cfg(feature = "onnx")]
pub fn create(models_dir: &Path) -> Result<Box<dyn RecognizerAdapter>> {
    let dir = models_dir.join(ENGINE);
    if let Some(missing) = backend::spec().missing_file(&dir) {
        return Err(crate::types::IngestError::unavailable(
            ENGINE,
            format!("model file {} not found", missing.display()),
        ));
    }
    Ok(Box::new(backend::DonutAdapter { default_dir: dir }))
}

#[cfg(not(feature = "onnx"))]
pub fn create(_models_dir: &Path) -> Result<Box<dyn RecognizerAdapter>> {
    Err(crate::types::IngestError::unavailable(
        ENGINE,
        "built without the `onnx` feature",
    ))
}

#[cfg(feature = "onnx")]
mod backend {
    use image::DynamicImage;
    use log::debug;
    use serde_json::Value;
    use std::path::PathBuf;
    use std::time::Instant;

    use super::{DEFAULT_TASK_PROMPT, ENGINE};
    use crate::engines::seq2seq::{runs_on_gpu, ModelSpec, Seq2SeqModel};
    use crate::engines::{device_label, run_metadata};
    use crate::recognition::{EngineConfig, RecognitionOutcome, RecognizerAdapter};
    use crate::types::{IngestError, Result};

    pub(super) fn spec() -> ModelSpec {
        ModelSpec {
            encoder_file: "encoder.onnx",
            decoder_file: "decoder.onnx",
            input_size: (1920, 2560),
            max_length: 1024,
            grayscale: false,
        }
    }

    pub struct DonutAdapter {
        pub(super) default_dir: PathBuf,
    }

    impl RecognizerAdapter for DonutAdapter {
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
            let dir = config.model().map(PathBuf::from).unwrap_or_else(|| self.default_dir.clone());
            let mut model = Seq2SeqModel::load(&dir, spec(), config.use_gpu())
                .map_err(|e| IngestError::unavailable(ENGINE, format!("{:#}", e)))?;
            let task_prompt = config.get_str("task_prompt").unwrap_or(DEFAULT_TASK_PROMPT);
            let prompt = model
                .tokenizer()
                .encode_prompt(task_prompt)
                .map_err(|e| IngestError::engine_failed(ENGINE, format!("{:#}", e)))?;

            let mut texts = Vec::with_capacity(images.len());
            for (index, image) in images.iter().enumerate() {
                let text = model
                    .generate(image, &prompt)
                    .map_err(|e| IngestError::engine_failed(ENGINE, format!("{:#}", e)))?;
                debug!("donut page {}: {} chars", index + 1, text.chars().count());
                texts.push(text);
            }

            let mut metadata = run_metadata(started, Some(images.len()));
            let on_gpu = runs_on_gpu(config.use_gpu());
            metadata.insert("device".to_string(), Value::from(device_label(on_gpu)));
            Ok(RecognitionOutcome::new(texts.join("\n"), 0.0, ENGINE, metadata))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IngestError;

    #[test]
    fn test_missing_models_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            create(dir.path()),
            Err(IngestError::DependencyUnavailable { .. })
        ));
    }
}
