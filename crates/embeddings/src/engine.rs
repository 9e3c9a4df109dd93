use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result, anyhow};
use ort::{session::Session, value::Tensor};
use parking_lot::Mutex;
use tokenizers::Tokenizer;

use crate::config::{EmbeddingConfig, ExecutionDevice};

/// Sentence encoder for search queries.
///
/// Wraps an ONNX sentence-transformer export; vectors are mean-pooled over the
/// attention mask and optionally L2-normalised, which matches how the catalog
/// vectors were produced offline.
pub struct EmbeddingEngine {
    config: EmbeddingConfig,
    device_used: ExecutionDevice,
    backend: Backend,
}

enum Backend {
    Onnx(OnnxModel),
    Pseudo,
    Unavailable(String),
}

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

struct TokenizedQuery {
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    seq_len: usize,
}

impl EmbeddingEngine {
    pub fn new(config: EmbeddingConfig) -> Self {
        let device_used = resolve_device(config.execution_device);
        let backend = match load_backend(&config) {
            Ok(backend) => backend,
            Err(err) => {
                tracing::warn!(model = %config.model_path, error = %err, "query encoder unavailable");
                Backend::Unavailable(err.to_string())
            }
        };
        Self {
            config,
            device_used,
            backend,
        }
    }

    pub const fn dimension(&self) -> usize {
        self.config.vector_dim
    }

    pub const fn device_mode(&self) -> &'static str {
        match self.device_used {
            ExecutionDevice::Cpu => "cpu",
            ExecutionDevice::GpuPreferred => "gpu",
        }
    }

    pub const fn is_available(&self) -> bool {
        !matches!(self.backend, Backend::Unavailable(_))
    }

    pub fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let input = format!("{}{text}", self.config.query_prefix);
        let mut vector = match &self.backend {
            Backend::Onnx(model) => model.encode(&input, &self.config)?,
            Backend::Pseudo => pseudo_embed(&input, self.config.vector_dim),
            Backend::Unavailable(msg) => {
                return Err(anyhow!(
                    "query encoder unavailable: {msg}. set MEDISEARCH_ALLOW_PSEUDO_EMBED=true only for local test scaffolding"
                ));
            }
        };
        if self.config.normalize {
            l2_normalize(&mut vector);
        }
        Ok(vector)
    }
}

impl OnnxModel {
    fn encode(&self, text: &str, cfg: &EmbeddingConfig) -> Result<Vec<f32>> {
        let tokens = tokenize(&self.tokenizer, text, cfg.max_sequence_length)?;
        let shape = vec![1_i64, tokens.seq_len as i64];
        let ids = Tensor::<i64>::from_array((shape.clone(), tokens.input_ids.clone()))?;
        let mask = Tensor::<i64>::from_array((shape.clone(), tokens.attention_mask.clone()))?;
        let token_types = Tensor::<i64>::from_array((shape, vec![0_i64; tokens.seq_len]))?;

        let mut session = self.session.lock();
        let mut feeds = HashMap::new();
        for input in session.inputs() {
            let name = input.name().to_lowercase();
            let value = if name.contains("attention") && name.contains("mask") {
                mask.clone().upcast()
            } else if name.contains("token_type") {
                token_types.clone().upcast()
            } else {
                ids.clone().upcast()
            };
            feeds.insert(input.name().to_string(), value);
        }

        let mut outputs = session.run(feeds)?;
        let first = outputs
            .keys()
            .next()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("encoder returned no outputs"))?;
        let output = outputs
            .remove(first)
            .ok_or_else(|| anyhow!("encoder output extraction failed"))?;
        let (dims, values) = output
            .try_extract_tensor::<f32>()
            .map_err(|err| anyhow!("encoder output decode failed: {err}"))?;

        mean_pool(dims, values, &tokens.attention_mask, cfg.vector_dim)
    }
}

/// Collapses a `[1, hidden]` or `[1, seq, hidden]` output into one vector.
fn mean_pool(dims: &[i64], values: &[f32], mask: &[i64], target_dim: usize) -> Result<Vec<f32>> {
    let hidden = dims
        .last()
        .and_then(|h| usize::try_from(*h).ok())
        .filter(|h| *h > 0)
        .ok_or_else(|| anyhow!("encoder output hidden dimension is invalid: {dims:?}"))?;

    if dims.len() == 2 {
        if values.len() < hidden {
            return Err(anyhow!("encoder output shorter than hidden size {hidden}"));
        }
        return Ok(fit_dimension(&values[..hidden], target_dim));
    }
    if dims.len() != 3 {
        return Err(anyhow!("encoder output rank {} is unsupported", dims.len()));
    }

    let seq = usize::try_from(dims[1]).unwrap_or(0);
    if values.len() < seq * hidden {
        return Err(anyhow!("encoder output tensor too small for pooling"));
    }
    let mut pooled = vec![0.0_f32; hidden];
    let mut counted = 0.0_f32;
    for token in 0..seq {
        if mask.get(token).copied().unwrap_or(0) == 0 {
            continue;
        }
        counted += 1.0;
        let row = &values[token * hidden..(token + 1) * hidden];
        for (acc, v) in pooled.iter_mut().zip(row) {
            *acc += v;
        }
    }
    if counted > 0.0 {
        pooled.iter_mut().for_each(|v| *v /= counted);
    }
    Ok(fit_dimension(&pooled, target_dim))
}

fn fit_dimension(values: &[f32], target_dim: usize) -> Vec<f32> {
    let mut out = vec![0.0_f32; target_dim];
    let n = values.len().min(target_dim);
    out[..n].copy_from_slice(&values[..n]);
    out
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
}

fn tokenize(tokenizer: &Tokenizer, text: &str, max_len: usize) -> Result<TokenizedQuery> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|err| anyhow!("tokenization failed: {err}"))?;
    let seq_len = encoding.get_ids().len().clamp(1, max_len.max(1));
    let mut input_ids = vec![0_i64; seq_len];
    let mut attention_mask = vec![0_i64; seq_len];
    for (pos, id) in encoding.get_ids().iter().take(seq_len).enumerate() {
        input_ids[pos] = i64::from(*id);
        attention_mask[pos] = 1;
    }
    Ok(TokenizedQuery {
        input_ids,
        attention_mask,
        seq_len,
    })
}

fn load_backend(config: &EmbeddingConfig) -> Result<Backend> {
    if config.allow_pseudo_fallback {
        return Ok(Backend::Pseudo);
    }
    let model_path = Path::new(&config.model_path);
    if !model_path.exists() {
        return Err(anyhow!("encoder model not found at {}", model_path.display()));
    }
    let tokenizer_path = config
        .tokenizer_path
        .as_deref()
        .ok_or_else(|| anyhow!("no tokenizer configured for {}", model_path.display()))?;

    let session = Session::builder()
        .context("failed to create ONNX session builder")?
        .commit_from_file(model_path)
        .with_context(|| format!("failed to load ONNX model {}", model_path.display()))?;
    let tokenizer = Tokenizer::from_file(tokenizer_path)
        .map_err(|err| anyhow!("failed loading tokenizer from {tokenizer_path}: {err}"))?;

    Ok(Backend::Onnx(OnnxModel {
        session: Mutex::new(session),
        tokenizer,
    }))
}

fn resolve_device(preferred: ExecutionDevice) -> ExecutionDevice {
    match preferred {
        ExecutionDevice::Cpu => ExecutionDevice::Cpu,
        ExecutionDevice::GpuPreferred => {
            if gpu_runtime_available() {
                ExecutionDevice::GpuPreferred
            } else {
                ExecutionDevice::Cpu
            }
        }
    }
}

fn gpu_runtime_available() -> bool {
    std::env::var("EMBEDDING_GPU_AVAILABLE")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Deterministic byte-histogram vector; only for tests and local scaffolding.
pub fn pseudo_embed(input: &str, dim: usize) -> Vec<f32> {
    let mut out = vec![0.0_f32; dim.max(1)];
    let n = out.len();
    for (idx, b) in input.to_lowercase().bytes().enumerate() {
        out[idx % n] += f32::from(b) / 255.0;
    }
    out
}
