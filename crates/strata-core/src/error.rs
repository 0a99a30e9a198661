// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Strata memory engine.

use thiserror::Error;

/// The primary error type used across all Strata adapters and engine operations.
///
/// Only [`StrataError::Storage`] is treated as fatal by the engine. A missing
/// embedding model is not an error at all: it is reported as a degraded
/// capability and search falls back to keyword matching.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Embedding backend errors (model load, tokenization, inference).
    #[error("embedding error: {0}")]
    Embedding(String),

    /// A graph edge was rejected (self-loop or unknown endpoint).
    #[error("invalid edge: {0}")]
    InvalidEdge(String),

    /// A referenced memory or key does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Adapter health check failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StrataError {
    /// Wraps any storage-layer error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StrataError::Storage {
            source: Box::new(err),
        }
    }

    /// Returns true for errors the engine must propagate rather than degrade around.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StrataError::Storage { .. } | StrataError::Internal(_))
    }
}
