// Tokenizer for the ONNX encoder-decoder engines (TrOCR, Donut)
use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::path::Path;
use tokenizers::tokenizer::Tokenizer;

const BOS_TOKEN: &str = "<s>";
const EOS_TOKEN: &str = "</s>";
const PAD_TOKEN: &str = "<pad>";

/// Decodes generated ids. Prefers `tokenizer.json`; falls back to a
/// byte-level BPE `vocab.json`.
pub struct Seq2SeqTokenizer {
    tokenizer: Option<Tokenizer>,
    id_to_token: HashMap<u32, String>,
    bos_token_id: u32,
    eos_token_id: u32,
    pad_token_id: u32,
}

impl Seq2SeqTokenizer {
    pub fn load(dir: &Path) -> Result<Self> {
        let mut id_to_token: HashMap<u32, String> = HashMap::new();
        let vocab_path = dir.join("vocab.json");
        if vocab_path.exists() {
            let vocab_str = std::fs::read_to_string(&vocab_path)
                .with_context(|| format!("reading {}", vocab_path.display()))?;
            let vocab: HashMap<String, u32> = serde_json::from_str(&vocab_str)
                .with_context(|| format!("parsing {}", vocab_path.display()))?;
            id_to_token = vocab.into_iter().map(|(token, id)| (id, token)).collect();
            debug!("loaded vocabulary with {} tokens", id_to_token.len());
        }

        let tokenizer_path = dir.join("tokenizer.json");
        let tokenizer = if tokenizer_path.exists() {
            match Tokenizer::from_file(&tokenizer_path) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!("failed to load {}: {}", tokenizer_path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        if tokenizer.is_none() && id_to_token.is_empty() {
            anyhow::bail!("no tokenizer.json or vocab.json in {}", dir.display());
        }

        let special = |token: &str, default: u32| {
            tokenizer
                .as_ref()
                .and_then(|t| t.token_to_id(token))
                .unwrap_or(default)
        };
        let bos_token_id = special(BOS_TOKEN, 0);
        let pad_token_id = special(PAD_TOKEN, 1);
        let eos_token_id = special(EOS_TOKEN, 2);

        Ok(Self {
            tokenizer,
            id_to_token,
            bos_token_id,
            eos_token_id,
            pad_token_id,
        })
    }

    pub fn decode_ids(&self, token_ids: &[u32]) -> String {
        if let Some(ref tokenizer) = self.tokenizer {
            return tokenizer.decode(token_ids, true).unwrap_or_default();
        }

        let mut decoded = String::new();
        for &id in token_ids {
            if id == self.eos_token_id {
                break;
            }
            if id == self.pad_token_id || id == self.bos_token_id {
                continue;
            }
            let Some(token) = self.id_to_token.get(&id) else { continue };
            if token.starts_with('<') && token.ends_with('>') {
                continue;
            }
            // Ġ marks a leading space in GPT-2 style BPE
            match token.strip_prefix('Ġ') {
                Some(rest) => {
                    decoded.push(' ');
                    decoded.push_str(rest);
                }
                None => decoded.push_str(token),
            }
        }
        decoded.trim().to_string()
    }

    /// Ids of a task prompt, without special-token wrapping
    pub fn encode_prompt(&self, prompt: &str) -> Result<Vec<i64>> {
        let tokenizer = self
            .tokenizer
            .as_ref()
            .context("task prompts need tokenizer.json")?;
        let encoding = tokenizer.encode(prompt, false).map_err(anyhow::Error::msg)?;
        Ok(encoding.get_ids().iter().map(|&id| id as i64).collect())
    }

    pub fn decoder_start_ids(&self) -> Vec<i64> {
        vec![self.bos_token_id as i64]
    }

    pub fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }
}
