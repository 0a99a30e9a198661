// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock embedding adapter for deterministic testing.
//!
//! `MockEmbedder` hashes lower-cased alphanumeric words into a fixed number
//! of buckets and L2-normalizes the counts. Identical texts embed
//! identically and texts sharing words land close together, which is
//! enough to drive similarity search without a model.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use strata_core::{
    AdapterType, EmbeddingAdapter, EmbeddingInput, EmbeddingOutput, HealthStatus, PluginAdapter,
    StrataError,
};

/// Dimensionality of every vector the mock produces.
pub const MOCK_DIMENSIONS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Healthy,
    /// Health check reports unhealthy.
    Unavailable,
    /// Health check passes but every embed call fails.
    Failing,
}

/// A deterministic embedding adapter.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    mode: Mode,
    overrides: HashMap<String, Vec<f32>>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            mode: Mode::Healthy,
            overrides: HashMap::new(),
        }
    }

    /// An embedder whose health check fails.
    pub fn unavailable() -> Self {
        Self {
            mode: Mode::Unavailable,
            ..Self::new()
        }
    }

    /// An embedder that probes healthy but errors on every call.
    pub fn failing() -> Self {
        Self {
            mode: Mode::Failing,
            ..Self::new()
        }
    }

    /// Return `vector` for exactly `text`. Shorter vectors are zero-padded
    /// to [`MOCK_DIMENSIONS`]; the result is normalized.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        let mut padded = vector;
        padded.resize(MOCK_DIMENSIONS, 0.0);
        self.overrides.insert(text.into(), normalize(padded));
        self
    }

    /// The vector produced for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.overrides.get(text) {
            return v.clone();
        }
        let mut buckets = vec![0.0f32; MOCK_DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            buckets[(hasher.finish() % MOCK_DIMENSIONS as u64) as usize] += 1.0;
        }
        normalize(buckets)
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, StrataError> {
        match self.mode {
            Mode::Unavailable => Ok(HealthStatus::Unhealthy("mock model not loaded".into())),
            _ => Ok(HealthStatus::Healthy),
        }
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, StrataError> {
        if self.mode != Mode::Healthy {
            return Err(StrataError::Embedding("mock embedding failure".into()));
        }
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.vector_for(t)).collect(),
            dimensions: MOCK_DIMENSIONS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn identical_text_is_identical_and_unit_length() {
        let m = MockEmbedder::new();
        let a = m.vector_for("We use SQLite");
        assert_eq!(a, m.vector_for("we use sqlite!"));
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_words_raise_similarity() {
        let m = MockEmbedder::new();
        let base = m.vector_for("the staging server runs on port 8080");
        let close = m.vector_for("the staging server runs on port 9090");
        let far = m.vector_for("lunch is at noon");
        assert!(dot(&base, &close) > dot(&base, &far));
    }

    #[test]
    fn overrides_are_padded_and_normalized() {
        let m = MockEmbedder::new().with_vector("x", vec![3.0, 4.0]);
        let v = m.vector_for("x");
        assert_eq!(v.len(), MOCK_DIMENSIONS);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn modes() {
        let unavailable = MockEmbedder::unavailable();
        assert!(!unavailable.health_check().await.unwrap().is_usable());

        let failing = MockEmbedder::failing();
        assert!(failing.health_check().await.unwrap().is_usable());
        assert!(failing.embed(EmbeddingInput::single("x")).await.is_err());

        let out = MockEmbedder::new()
            .embed(EmbeddingInput::single("hello"))
            .await
            .unwrap();
        assert_eq!(out.dimensions, MOCK_DIMENSIONS);
        assert_eq!(out.embeddings.len(), 1);
    }
}
