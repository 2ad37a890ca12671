// Vision encoder-decoder runner on ONNX Runtime, shared by TrOCR and Donut
use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use log::debug;
use ort::{inputs, session::builder::GraphOptimizationLevel, session::Session, value::Value};
use std::path::{Path, PathBuf};

use super::tokenizer::Seq2SeqTokenizer;

/// File layout and preprocessing of one exported model
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub encoder_file: &'static str,
    pub decoder_file: &'static str,
    /// (width, height) fed to the encoder
    pub input_size: (u32, u32),
    pub max_length: usize,
    pub grayscale: bool,
}

impl ModelSpec {
    pub fn files(&self, dir: &Path) -> [PathBuf; 2] {
        [dir.join(self.encoder_file), dir.join(self.decoder_file)]
    }

    /// First required file that is not on disk
    pub fn missing_file(&self, dir: &Path) -> Option<PathBuf> {
        self.files(dir).into_iter().find(|path| !path.exists())
    }
}

/// True when sessions are built with the CUDA provider for this request.
pub fn runs_on_gpu(use_gpu: bool) -> bool {
    use_gpu && cfg!(feature = "cuda")
}

fn load_session(path: &Path, use_gpu: bool) -> Result<Session> {
    let builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?;
    #[cfg(feature = "cuda")]
    let builder = if use_gpu {
        use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
        builder.with_execution_providers([
            CUDAExecutionProvider::default().with_device_id(0).build(),
            CPUExecutionProvider::default().build(),
        ])?
    } else {
        builder
    };
    #[cfg(not(feature = "cuda"))]
    let _ = use_gpu;
    let session = builder
        .commit_from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    Ok(session)
}

pub struct Seq2SeqModel {
    encoder: Session,
    decoder: Session,
    tokenizer: Seq2SeqTokenizer,
    spec: ModelSpec,
}

impl Seq2SeqModel {
    pub fn load(dir: &Path, spec: ModelSpec, use_gpu: bool) -> Result<Self> {
        let [encoder_path, decoder_path] = spec.files(dir);
        debug!("loading encoder {} and decoder {}", encoder_path.display(), decoder_path.display());
        let encoder = load_session(&encoder_path, use_gpu)?;
        let decoder = load_session(&decoder_path, use_gpu)?;
        let tokenizer = Seq2SeqTokenizer::load(dir)?;
        Ok(Self {
            encoder,
            decoder,
            tokenizer,
            spec,
        })
    }

    pub fn tokenizer(&self) -> &Seq2SeqTokenizer {
        &self.tokenizer
    }

    // CHW layout, normalized to [-1, 1]
    fn pixel_values(&self, image: &DynamicImage) -> Vec<f32> {
        let (width, height) = self.spec.input_size;
        let source = if self.spec.grayscale {
            DynamicImage::ImageLuma8(image.to_luma8())
        } else {
            image.clone()
        };
        let processed = source
            .resize_exact(width, height, FilterType::Lanczos3)
            .to_rgb8();

        let mut pixels = Vec::with_capacity(3 * (width * height) as usize);
        for channel in 0..3 {
            for y in 0..height {
                for x in 0..width {
                    let value = processed.get_pixel(x, y)[channel] as f32 / 255.0;
                    pixels.push((value - 0.5) / 0.5);
                }
            }
        }
        pixels
    }

    /// Greedy decoding from `prompt` (the decoder start ids when empty).
    pub fn generate(&mut self, image: &DynamicImage, prompt: &[i64]) -> Result<String> {
        let (width, height) = self.spec.input_size;
        let pixels = self.pixel_values(image);
        let encoder_input = Value::from_array((
            [1_usize, 3, height as usize, width as usize],
            pixels.into_boxed_slice(),
        ))?;
        let encoder_outputs = self.encoder.run(inputs![encoder_input])?;
        let (enc_shape, enc_data) = encoder_outputs[0].try_extract_tensor::<f32>()?;
        let enc_shape = enc_shape.clone();
        let enc_data: Vec<f32> = enc_data.to_vec();
        drop(encoder_outputs);

        let mut decoder_input_ids = if prompt.is_empty() {
            self.tokenizer.decoder_start_ids()
        } else {
            prompt.to_vec()
        };
        let eos = self.tokenizer.eos_token_id();
        let mut generated: Vec<u32> = Vec::new();

        for step in 0..self.spec.max_length {
            let input_ids = Value::from_array((
                [1_usize, decoder_input_ids.len()],
                decoder_input_ids.clone().into_boxed_slice(),
            ))?;
            let encoder_hidden_states =
                Value::from_array((enc_shape.clone(), enc_data.clone().into_boxed_slice()))?;
            let use_cache = Value::from_array(([1_usize], vec![false].into_boxed_slice()))?;

            let decoder_outputs = self.decoder.run(inputs![
                "input_ids" => input_ids,
                "encoder_hidden_states" => encoder_hidden_states,
                "use_cache_branch" => use_cache
            ])?;
            let (logits_shape, logits) = decoder_outputs[0].try_extract_tensor::<f32>()?;
            let vocab_size = logits_shape[2] as usize;
            let last_start = ((logits_shape[1] - 1) * logits_shape[2]) as usize;
            let next = argmax(&logits[last_start..last_start + vocab_size])
                .context("decoder returned empty logits")?;

            if next == eos {
                debug!("eos at step {}", step);
                break;
            }
            generated.push(next);
            decoder_input_ids.push(next as i64);

            if repeating_tail(&generated) {
                debug!("stopping on repeated tokens after {} steps", step + 1);
                break;
            }
        }

        Ok(self.tokenizer.decode_ids(&generated))
    }
}

fn argmax(logits: &[f32]) -> Option<u32> {
    logits
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(idx, _)| idx as u32)
}

/// True when the tail is one token five times, or a two- or three-token
/// pattern repeated (8 and 9 tokens respectively).
fn repeating_tail(tokens: &[u32]) -> bool {
    if tokens.len() < 5 {
        return false;
    }
    let last_5 = &tokens[tokens.len() - 5..];
    if last_5.iter().all(|&t| t == last_5[0]) {
        return true;
    }
    [(2_usize, 8_usize), (3, 9)].iter().any(|&(period, window)| {
        tokens.len() >= window && {
            let tail = &tokens[tokens.len() - window..];
            tail.iter().enumerate().all(|(i, &t)| t == tail[i % period])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_only_with_cuda_build() {
        assert!(!runs_on_gpu(false));
        assert_eq!(runs_on_gpu(true), cfg!(feature = "cuda"));
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 2.5, -1.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_repetition_guards() {
        assert!(!repeating_tail(&[1, 2, 3, 4]));
        assert!(repeating_tail(&[9, 7, 7, 7, 7, 7]));
        assert!(repeating_tail(&[1, 2, 1, 2, 1, 2, 1, 2]));
        assert!(repeating_tail(&[5, 1, 2, 3, 1, 2, 3, 1, 2, 3]));
        assert!(!repeating_tail(&[1, 2, 3, 4, 5, 6, 7, 8, 9]));
    }

    #[test]
    fn test_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ModelSpec {
            encoder_file: "enc.onnx",
            decoder_file: "dec.onnx",
            input_size: (384, 384),
            max_length: 16,
            grayscale: false,
        };
        assert_eq!(spec.missing_file(dir.path()), Some(dir.path().join("enc.onnx")));
        std::fs::write(dir.path().join("enc.onnx"), b"").unwrap();
        assert_eq!(spec.missing_file(dir.path()), Some(dir.path().join("dec.onnx")));
    }
}
