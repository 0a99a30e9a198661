// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered long-term memory for agents.
//!
//! Records are routed into identity, active and archive layers, linked by a
//! typed relationship graph (`updates`, `extends`, `derives`), surfaced
//! predictively from conversation context and periodically consolidated.
//!
//! ## Architecture
//!
//! - **MemoryStore**: SQLite records with BLOB embeddings and keyword fallback
//! - **LayerClassifier**: heuristic layer routing and salience scoring
//! - **MemoryGraph**: relation detection, supersession, temporal expiry
//! - **Surfacer**: entity, temporal and topic tiers with contradiction flags
//! - **Consolidator**: pruning and near-duplicate merging
//! - **HeuristicExtractor**: pattern-based statement extraction
//! - **MemoryEngine**: facade over all of the above
//! - **OnnxEmbedder** (feature `onnx`): local sentence-embedding model

pub mod capability;
pub mod classifier;
pub mod consolidator;
#[cfg(feature = "onnx")]
pub mod embedder;
pub mod engine;
pub mod extractor;
pub mod graph;
pub mod index;
mod patterns;
pub mod store;
pub mod surfacer;
pub mod temporal;
pub mod types;

pub use capability::{Embedding, EmbeddingCapability};
pub use classifier::{Classification, ClassifierRules, LayerClassifier};
pub use consolidator::{
    ConsolidateOptions, ConsolidationPreview, ConsolidationReport, Consolidator,
};
#[cfg(feature = "onnx")]
pub use embedder::OnnxEmbedder;
pub use engine::{open_embedder, EngineStats, IngestOutcome, IngestRequest, MemoryEngine};
pub use extractor::{ExtractedMemory, ExtractionRules, HeuristicExtractor};
pub use graph::{MemoryGraph, RelationRules};
pub use index::{ExactCosineIndex, Neighbor, NeighborFilter, VectorIndex};
pub use store::MemoryStore;
pub use surfacer::{format_surfaced, ContextEntities, EntityKind, Surfacer, SurfacingRules};
pub use temporal::{ExpiryRules, TemporalCues};
pub use types::*;
