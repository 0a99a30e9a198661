// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Strata memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Strata configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrataConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Local embedding model settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Record store search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Relationship graph settings.
    #[serde(default)]
    pub graph: GraphConfig,

    /// Predictive surfacing settings.
    #[serde(default)]
    pub surfacing: SurfacingConfig,

    /// Consolidation (prune and merge) settings.
    #[serde(default)]
    pub consolidation: ConsolidationConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("strata").join("memory.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("memory.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Token pooling strategy for sentence embedding models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Use the first ([CLS]) token, as BGE models expect.
    Cls,
    /// Attention-masked mean over all tokens, as MiniLM models expect.
    Mean,
}

/// Local embedding model configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Load the embedding model at startup. When false, search always
    /// uses the keyword fallback.
    #[serde(default = "default_embedding_enabled")]
    pub enabled: bool,

    /// Directory containing `model.onnx` and `tokenizer.json`.
    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    #[serde(default = "default_pooling")]
    pub pooling: Pooling,

    /// Input is truncated to this many tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: default_embedding_enabled(),
            model_dir: default_model_dir(),
            pooling: default_pooling(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_embedding_enabled() -> bool {
    true
}

fn default_model_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("strata").join("models").join("bge-small-en-v1.5"))
        .unwrap_or_else(|| std::path::PathBuf::from("models/bge-small-en-v1.5"))
        .to_string_lossy()
        .into_owned()
}

fn default_pooling() -> Pooling {
    Pooling::Cls
}

fn default_max_tokens() -> usize {
    512
}

/// Record store search configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Results returned when the caller does not specify a limit.
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// Number of similar records compared against each newly ingested one.
    #[serde(default = "default_detection_candidates")]
    pub detection_candidates: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            detection_candidates: default_detection_candidates(),
        }
    }
}

fn default_search_limit() -> usize {
    5
}

fn default_detection_candidates() -> usize {
    5
}

/// Relationship graph configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    /// Maximum number of `updates` hops followed when resolving a superseded record.
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: usize,

    /// Characters of connected content shown in edge listings.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: default_max_chain_depth(),
            preview_chars: default_preview_chars(),
        }
    }
}

fn default_max_chain_depth() -> usize {
    10
}

fn default_preview_chars() -> usize {
    100
}

/// Predictive surfacing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SurfacingConfig {
    #[serde(default = "default_surfacing_limit")]
    pub default_limit: usize,

    /// Candidates below this confidence are dropped (0.0-1.0).
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Maximum number of records surfaced at session startup.
    #[serde(default = "default_startup_limit")]
    pub startup_limit: usize,
}

impl Default for SurfacingConfig {
    fn default() -> Self {
        Self {
            default_limit: default_surfacing_limit(),
            min_confidence: default_min_confidence(),
            startup_limit: default_startup_limit(),
        }
    }
}

fn default_surfacing_limit() -> usize {
    5
}

fn default_min_confidence() -> f64 {
    0.3
}

fn default_startup_limit() -> usize {
    5
}

/// Consolidation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConsolidationConfig {
    /// Archive records younger than this are never pruned.
    #[serde(default = "default_prune_min_age_days")]
    pub prune_min_age_days: i64,

    /// Archive records at or above this salience are never pruned.
    #[serde(default = "default_prune_max_salience")]
    pub prune_max_salience: f64,

    /// Relevance above which two archive records are merged.
    #[serde(default = "default_merge_similarity")]
    pub merge_similarity: f64,

    /// Neighbours inspected per record during the merge scan.
    #[serde(default = "default_merge_neighbors")]
    pub merge_neighbors: usize,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            prune_min_age_days: default_prune_min_age_days(),
            prune_max_salience: default_prune_max_salience(),
            merge_similarity: default_merge_similarity(),
            merge_neighbors: default_merge_neighbors(),
        }
    }
}

fn default_prune_min_age_days() -> i64 {
    7
}

fn default_prune_max_salience() -> f64 {
    0.4
}

fn default_merge_similarity() -> f64 {
    0.85
}

fn default_merge_neighbors() -> usize {
    5
}
