// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding capability probed once at startup.
//!
//! Search never fails because embeddings are missing: an absent or broken
//! model is reported here and every caller takes the keyword path instead.

use std::sync::Arc;

use strata_core::{EmbeddingAdapter, EmbeddingInput};
use tracing::{debug, warn};

/// Result of embedding one text.
#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    Vector(Vec<f32>),
    Unavailable,
}

impl Embedding {
    pub fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Embedding::Vector(v) => Some(v),
            Embedding::Unavailable => None,
        }
    }
}

/// Optional embedding adapter plus the outcome of its startup health check.
#[derive(Clone)]
pub struct EmbeddingCapability {
    adapter: Option<Arc<dyn EmbeddingAdapter>>,
    available: bool,
}

impl EmbeddingCapability {
    /// No embedding backend. All retrieval uses keyword matching.
    pub fn none() -> Self {
        Self {
            adapter: None,
            available: false,
        }
    }

    /// Health-check `adapter` and remember whether it can be used.
    pub async fn probe(adapter: Arc<dyn EmbeddingAdapter>) -> Self {
        let available = match adapter.health_check().await {
            Ok(status) if status.is_usable() => true,
            Ok(status) => {
                warn!(adapter = adapter.name(), ?status, "embedding adapter unusable, using keyword search");
                false
            }
            Err(e) => {
                warn!(adapter = adapter.name(), error = %e, "embedding health check failed, using keyword search");
                false
            }
        };
        Self {
            adapter: Some(adapter),
            available,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Embed one text. Failures degrade to [`Embedding::Unavailable`].
    pub async fn embed(&self, text: &str) -> Embedding {
        let Some(adapter) = self.adapter.as_ref().filter(|_| self.available) else {
            return Embedding::Unavailable;
        };
        match adapter.embed(EmbeddingInput::single(text)).await {
            Ok(output) => match output.embeddings.into_iter().next() {
                Some(v) if !v.is_empty() => Embedding::Vector(v),
                _ => {
                    warn!(adapter = adapter.name(), "embedding adapter returned no vector");
                    Embedding::Unavailable
                }
            },
            Err(e) => {
                warn!(adapter = adapter.name(), error = %e, "embedding failed, falling back to keyword search");
                Embedding::Unavailable
            }
        }
    }

    pub async fn shutdown(&self) {
        if let Some(adapter) = &self.adapter
            && let Err(e) = adapter.shutdown().await
        {
            debug!(adapter = adapter.name(), error = %e, "embedding adapter shutdown failed");
        }
    }
}

impl std::fmt::Debug for EmbeddingCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCapability")
            .field("adapter", &self.adapter.as_ref().map(|a| a.name()))
            .field("available", &self.available)
            .finish()
    }
}
