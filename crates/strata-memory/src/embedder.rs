// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ONNX embedding adapter for local sentence-embedding models.
//!
//! Runs BGE or MiniLM style encoders on CPU. The model directory must hold
//! `model.onnx` and `tokenizer.json`.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use tracing::info;

use strata_config::model::{EmbeddingConfig, Pooling};
use strata_core::{
    AdapterType, EmbeddingAdapter, EmbeddingInput, EmbeddingOutput, HealthStatus, PluginAdapter,
    StrataError,
};

fn onnx_err<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> StrataError + '_ {
    move |e| StrataError::Embedding(format!("{context}: {e}"))
}

/// Local ONNX encoder with configurable pooling.
pub struct OnnxEmbedder {
    /// ONNX Runtime session, serialized behind a mutex.
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    pooling: Pooling,
    max_tokens: usize,
}

// Safety: the session is only reached through the Mutex, and tokenizer
// encoding takes `&self` without interior mutation.
unsafe impl Send for OnnxEmbedder {}
unsafe impl Sync for OnnxEmbedder {}

impl OnnxEmbedder {
    /// Loads the model and tokenizer named by `config.model_dir`.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, StrataError> {
        let model_dir = Path::new(&config.model_dir);
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        if !model_path.exists() || !tokenizer_path.exists() {
            return Err(StrataError::Embedding(format!(
                "model files not found in {}",
                model_dir.display()
            )));
        }

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            StrataError::Embedding(format!(
                "failed to load tokenizer from {}: {e}",
                tokenizer_path.display()
            ))
        })?;

        let session = Session::builder()
            .map_err(onnx_err("failed to create ONNX session builder"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(onnx_err("failed to set optimization level"))?
            .with_intra_threads(1)
            .map_err(onnx_err("failed to set thread count"))?
            .commit_from_file(&model_path)
            .map_err(|e| {
                StrataError::Embedding(format!(
                    "failed to load ONNX model from {}: {e}",
                    model_path.display()
                ))
            })?;

        info!(model_dir = %model_dir.display(), pooling = ?config.pooling, "embedding model loaded");
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            pooling: config.pooling,
            max_tokens: config.max_tokens.max(1),
        })
    }

    /// Embed one text into an L2-normalized vector.
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>, StrataError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| StrataError::Embedding(format!("tokenization failed: {e}")))?;

        let seq_len = encoding.get_ids().len().min(self.max_tokens);
        let to_i64 = |xs: &[u32]| xs.iter().take(seq_len).map(|&x| i64::from(x)).collect::<Vec<_>>();
        let input_ids = to_i64(encoding.get_ids());
        let attention_mask = to_i64(encoding.get_attention_mask());
        let token_type_ids = to_i64(encoding.get_type_ids());

        let shape_err = |e: ndarray::ShapeError| StrataError::Embedding(format!("bad input shape: {e}"));
        let input_ids_array = Array2::from_shape_vec((1, seq_len), input_ids).map_err(shape_err)?;
        let attention_mask_array =
            Array2::from_shape_vec((1, seq_len), attention_mask.clone()).map_err(shape_err)?;
        let token_type_ids_array =
            Array2::from_shape_vec((1, seq_len), token_type_ids).map_err(shape_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| StrataError::Embedding(format!("ONNX session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => TensorRef::from_array_view(&input_ids_array)
                    .map_err(onnx_err("input_ids tensor"))?,
                "attention_mask" => TensorRef::from_array_view(&attention_mask_array)
                    .map_err(onnx_err("attention_mask tensor"))?,
                "token_type_ids" => TensorRef::from_array_view(&token_type_ids_array)
                    .map_err(onnx_err("token_type_ids tensor"))?
            ])
            .map_err(onnx_err("ONNX inference failed"))?;

        // [1, seq_len, hidden]
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(onnx_err("failed to extract output tensor"))?;
        let hidden_size = shape.last().copied().unwrap_or(0).max(0) as usize;
        if hidden_size == 0 || data.len() < seq_len * hidden_size {
            return Err(StrataError::Embedding(format!(
                "unexpected output shape {shape:?}"
            )));
        }

        let pooled = match self.pooling {
            Pooling::Cls => data[..hidden_size].to_vec(),
            Pooling::Mean => mean_pool_with_attention(data, &attention_mask, seq_len, hidden_size),
        };
        Ok(l2_normalize(&pooled))
    }
}

/// Attention-masked mean over token embeddings.
fn mean_pool_with_attention(
    embeddings: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for (token, _) in attention_mask.iter().take(seq_len).enumerate().filter(|(_, m)| **m > 0) {
        let row = &embeddings[token * hidden_size..(token + 1) * hidden_size];
        for (acc, v) in sum.iter_mut().zip(row) {
            *acc += v;
        }
        count += 1.0;
    }

    if count > 0.0 {
        for val in &mut sum {
            *val /= count;
        }
    }
    sum
}

fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vec.iter().map(|v| v / norm).collect()
    } else {
        vec.to_vec()
    }
}

#[async_trait]
impl PluginAdapter for OnnxEmbedder {
    fn name(&self) -> &str {
        "onnx-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, StrataError> {
        match self.session.lock() {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("session lock poisoned: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OnnxEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, StrataError> {
        let embeddings = input
            .texts
            .iter()
            .map(|text| self.embed_text(text))
            .collect::<Result<Vec<_>, _>>()?;
        let dimensions = embeddings.first().map_or(0, Vec::len);
        Ok(EmbeddingOutput {
            embeddings,
            dimensions,
        })
    }
}
