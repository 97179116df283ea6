use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use tokenizers::Tokenizer;

use medrag_core::chunker::WordCodec;
use medrag_core::config::Pooling;
use medrag_core::traits::{Embedder, TokenCodec};

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::{cls_l2, masked_mean_l2};
pub use tokenize::{tokenize_batch, HfTokenCodec};

/// Texts per forward pass.
const FORWARD_BATCH: usize = 32;

#[derive(Deserialize)]
struct ModelShape {
    hidden_size: usize,
}

/// BERT-family sentence encoder (MiniLM, BGE) running on candle.
pub struct BertEmbedder { model: BertModel, tokenizer: Tokenizer, device: Device, pooling: Pooling, max_len: usize, dim: usize }

impl BertEmbedder {
    pub fn load(model_dir: &Path, pooling: Pooling, max_len: usize) -> Result<Self> {
        let device = device::select_device();
        tracing::info!(model_dir = %model_dir.display(), ?pooling, "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let _ = tokenizer.with_truncation(None);
        let _ = tokenizer.with_padding(None);

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let shape: ModelShape = serde_json::from_str(&raw_config)?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        tracing::info!(dim = shape.hidden_size, "embedding model loaded");
        Ok(Self { model, tokenizer, device, pooling, max_len, dim: shape.hidden_size })
    }

    /// Codec over this model's vocabulary, for chunking text destined for
    /// this embedder.
    pub fn codec(&self) -> HfTokenCodec {
        HfTokenCodec::new(self.tokenizer.clone())
    }

    fn embed_forward(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = pool::pool(self.pooling, &hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        Ok(rows)
    }
}

impl Embedder for BertEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(FORWARD_BATCH) {
            out.extend(self.embed_forward(batch)?);
        }
        tracing::debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis(), "embedded batch");
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle)?;
        return weights
            .into_iter()
            .map(|(name, t)| -> Result<(String, Tensor)> { Ok((name, t.to_device(device)?)) })
            .collect();
    }
    Err(anyhow!("No model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

/// Deterministic hashing embedder for tests and development.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            #[allow(clippy::cast_possible_truncation)]
            let idx = (h as usize) % self.dim;
            #[allow(clippy::cast_precision_loss)]
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32) + (i % 3) as f32 * 0.01;
            v[idx] += val;
        }
        medrag_core::vector::normalized(v)
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// An embedder together with the codec the chunker must use for it.
#[derive(Clone)]
pub struct EmbeddingProvider {
    pub embedder: Arc<dyn Embedder>,
    pub codec: Arc<dyn TokenCodec>,
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Load the model in `model_dir`, or a [`FakeEmbedder`] of `dim` dimensions
/// paired with a [`WordCodec`] when `APP_USE_FAKE_EMBEDDINGS` is set.
pub fn get_default_provider(model_dir: &Path, pooling: Pooling, max_len: usize, dim: usize) -> Result<EmbeddingProvider> {
    if use_fake_embeddings() {
        tracing::info!(dim, "using FakeEmbedder");
        return Ok(EmbeddingProvider { embedder: Arc::new(FakeEmbedder::new(dim)), codec: Arc::new(WordCodec::new()) });
    }
    let model_dir = resolve_model_dir(model_dir)?;
    let model = BertEmbedder::load(&model_dir, pooling, max_len)?;
    if model.dim() != dim {
        return Err(anyhow!("model in {} has dimension {}, index expects {}", model_dir.display(), model.dim(), dim));
    }
    let codec = model.codec();
    Ok(EmbeddingProvider { embedder: Arc::new(model), codec: Arc::new(codec) })
}

fn resolve_model_dir(configured: &Path) -> Result<PathBuf> {
    if configured.join("tokenizer.json").exists() && configured.join("config.json").exists() {
        tracing::debug!(model_dir = %configured.display(), "using model dir");
        return Ok(configured.to_path_buf());
    }
    Err(anyhow!("Could not locate model directory {} (expected tokenizer.json and config.json)", configured.display()))
}
