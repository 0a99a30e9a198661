// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use strata_core::MemoryId;

/// Routing layer of a memory record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Who the agent is: stable traits, relationships, names.
    Identity,
    /// What the agent is doing now: tasks, projects, recent decisions.
    Active,
    /// Everything else.
    Archive,
}

/// Typed relationship from a newer record (source) to an older one (target).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Source contradicts or replaces target. Target stops being latest.
    Updates,
    /// Source adds detail to target.
    Extends,
    /// Source is a loosely related inference from target.
    Derives,
}

/// Which edges to return for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Edges whose source is the record.
    #[strum(serialize = "out", serialize = "outbound")]
    Outbound,
    /// Edges whose target is the record.
    #[strum(serialize = "in", serialize = "inbound")]
    Inbound,
    Both,
}

/// Side of an edge relative to the record it was listed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeSide {
    Outbound,
    Inbound,
}

/// A stored memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: MemoryId,
    pub content: String,
    pub layer: Layer,
    /// Free-form tag such as `fact`, `decision` or `preference`.
    pub memory_type: String,
    /// Importance in [0, 1].
    pub salience: f64,
    pub created_at: String,
    pub updated_at: String,
    pub accessed_at: Option<String>,
    pub access_count: i64,
    pub metadata: Option<serde_json::Value>,
    /// False once an `updates` edge targets this record or its expiry passed.
    pub is_latest: bool,
    pub expires_at: Option<String>,
}

/// Input for [`crate::store::MemoryStore::add`].
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub content: String,
    pub memory_type: String,
    pub salience: f64,
    pub layer: Layer,
    pub metadata: Option<serde_json::Value>,
    /// Overrides the creation time (imports, tests). Defaults to now.
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewMemory {
    /// An archive `fact` with salience 0.5.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            memory_type: "fact".to_string(),
            salience: 0.5,
            layer: Layer::Archive,
            metadata: None,
            created_at: None,
            expires_at: None,
        }
    }

    pub fn memory_type(mut self, memory_type: impl Into<String>) -> Self {
        self.memory_type = memory_type.into();
        self
    }

    pub fn salience(mut self, salience: f64) -> Self {
        self.salience = salience;
        self
    }

    pub fn layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// A record returned by a ranked retrieval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMemory {
    pub record: MemoryRecord,
    /// `1 - cosine distance` on the vector path, 0.5 on the keyword path.
    pub relevance: f64,
}

/// A typed edge between two records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: i64,
    pub source_id: MemoryId,
    pub target_id: MemoryId,
    pub relation: Relation,
    pub confidence: f64,
    pub created_at: String,
    pub metadata: Option<serde_json::Value>,
}

/// An edge listed for one record, with a preview of the record on the other end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeView {
    pub edge: Edge,
    pub side: EdgeSide,
    pub connected_preview: String,
}

/// A relationship found by detection, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedRelation {
    pub source_id: MemoryId,
    pub target_id: MemoryId,
    pub relation: Relation,
    pub confidence: f64,
    pub target_preview: String,
}

/// A record that extends another, shown as extra context on retrieval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extension {
    pub id: MemoryId,
    pub content: String,
    pub memory_type: String,
    pub created_at: String,
    pub confidence: f64,
}

/// A retrieval result after graph resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMemory {
    /// The latest version of what was retrieved.
    pub record: MemoryRecord,
    /// Relevance of the originally retrieved record.
    pub relevance: f64,
    /// Set when a superseded record was replaced by its successor.
    pub supersedes: Option<MemoryId>,
    pub extensions: Vec<Extension>,
    /// Up to three extension previews joined by `"; "`.
    pub extended_context: Option<String>,
}

/// A record proposed by the surfacer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfacedCandidate {
    pub record_id: MemoryId,
    pub content: String,
    pub memory_type: String,
    pub relevance: f64,
    pub confidence: f64,
    pub reason: String,
    pub tags: Vec<String>,
    pub may_contradict: bool,
    pub supersedes: Option<MemoryId>,
    pub extended_context: Option<String>,
}

/// Record store statistics and capability flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub memories: i64,
    pub identity_keys: i64,
    pub active_keys: i64,
    pub embeddings: i64,
    pub by_layer: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
    pub embeddings_available: bool,
    pub vector_search_available: bool,
}

/// Relationship graph statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub total_edges: i64,
    pub by_relation: BTreeMap<String, i64>,
    pub superseded_memories: i64,
    pub temporal_memories: i64,
    pub avg_confidence: f64,
}

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert SQLite BLOB back to f32 vector. Trailing partial chunks are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity, or `None` when the vectors differ in length or one is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    (denom > f32::EPSILON).then(|| dot / denom)
}

/// First `max_chars` characters of `content`.
pub(crate) fn preview(content: &str, max_chars: usize) -> String {
    content.chars().take(max_chars).collect()
}
