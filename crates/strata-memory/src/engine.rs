// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Facade tying the store, classifier, graph, surfacer and consolidator
//! together.
//!
//! Ingestion always routes through the classifier and the graph: content is
//! classified, checked for an expiry phrase, stored, compared against its
//! nearest neighbours and linked.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strata_config::model::{EmbeddingConfig, StrataConfig};
use strata_core::{StorageAdapter, StrataError};
use strata_storage::{Database, KvEntry, SqliteStorage};
use tracing::{debug, info, warn};

use crate::capability::EmbeddingCapability;
use crate::classifier::LayerClassifier;
use crate::consolidator::{
    ConsolidateOptions, ConsolidationPreview, ConsolidationReport, Consolidator,
};
use crate::extractor::HeuristicExtractor;
use crate::graph::MemoryGraph;
use crate::store::MemoryStore;
use crate::surfacer::Surfacer;
use crate::temporal::ExpiryRules;
use crate::types::{
    Direction, Edge, EdgeView, GraphStats, Layer, MemoryId, NewMemory, Relation, ResolvedMemory,
    StoreStats, SurfacedCandidate,
};

/// Content to ingest.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub content: String,
    /// Declared type; stored as `fact` when absent.
    pub memory_type: Option<String>,
    pub base_salience: Option<f64>,
    pub metadata: Option<serde_json::Value>,
}

impl IngestRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn memory_type(mut self, memory_type: impl Into<String>) -> Self {
        self.memory_type = Some(memory_type.into());
        self
    }

    pub fn base_salience(mut self, salience: f64) -> Self {
        self.base_salience = Some(salience);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// What ingestion decided and persisted.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub id: MemoryId,
    pub layer: Layer,
    pub salience: f64,
    pub expires_at: Option<DateTime<Utc>>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub store: StoreStats,
    pub graph: GraphStats,
}

/// Probe the configured embedding model once.
///
/// Any failure leaves the engine on the keyword path.
pub async fn open_embedder(config: &EmbeddingConfig) -> EmbeddingCapability {
    if !config.enabled {
        debug!("embeddings disabled by configuration");
        return EmbeddingCapability::none();
    }
    #[cfg(feature = "onnx")]
    {
        match crate::embedder::OnnxEmbedder::new(config) {
            Ok(embedder) => EmbeddingCapability::probe(Arc::new(embedder)).await,
            Err(e) => {
                warn!(error = %e, "embedding model unavailable, using keyword search");
                EmbeddingCapability::none()
            }
        }
    }
    #[cfg(not(feature = "onnx"))]
    {
        warn!("built without onnx support, using keyword search");
        EmbeddingCapability::none()
    }
}

pub struct MemoryEngine {
    store: Arc<MemoryStore>,
    graph: Arc<MemoryGraph>,
    classifier: LayerClassifier,
    expiry: ExpiryRules,
    surfacer: Surfacer,
    consolidator: Consolidator,
    extractor: HeuristicExtractor,
    config: StrataConfig,
}

impl MemoryEngine {
    pub fn new(db: Database, embedder: EmbeddingCapability, config: &StrataConfig) -> Self {
        let store = Arc::new(MemoryStore::new(db.clone(), embedder));
        let graph = Arc::new(MemoryGraph::new(db, config.graph.clone()));
        let surfacer = Surfacer::new(store.clone(), graph.clone(), config.surfacing.clone());
        let consolidator = Consolidator::new(store.clone(), config.consolidation.clone());
        Self {
            store,
            graph,
            classifier: LayerClassifier::default(),
            expiry: ExpiryRules::default(),
            surfacer,
            consolidator,
            extractor: HeuristicExtractor::default(),
            config: config.clone(),
        }
    }

    /// Open the configured database and embedding model.
    pub async fn open(config: &StrataConfig) -> Result<Self, StrataError> {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let db = storage.database()?.clone();
        let embedder = open_embedder(&config.embedding).await;
        Ok(Self::new(db, embedder, config))
    }

    pub fn with_classifier(mut self, classifier: LayerClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_expiry(mut self, expiry: ExpiryRules) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_extractor(mut self, extractor: HeuristicExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn graph(&self) -> &MemoryGraph {
        &self.graph
    }

    pub fn surfacer(&self) -> &Surfacer {
        &self.surfacer
    }

    pub fn consolidator(&self) -> &Consolidator {
        &self.consolidator
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome, StrataError> {
        self.ingest_at(request, Utc::now()).await
    }

    /// Ingest with expiry phrases resolved against `now`.
    pub async fn ingest_at(
        &self,
        request: IngestRequest,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, StrataError> {
        let IngestRequest {
            content,
            memory_type,
            base_salience,
            metadata,
        } = request;

        let class = self
            .classifier
            .classify(&content, memory_type.as_deref(), base_salience);
        let expires_at = self.expiry.expires_at(&content, now);

        let mut memory = NewMemory::new(content.clone())
            .memory_type(memory_type.unwrap_or_else(|| "fact".to_string()))
            .salience(class.salience)
            .layer(class.layer)
            .created_at(now);
        if let Some(at) = expires_at {
            memory = memory.expires_at(at);
        }
        if let Some(metadata) = metadata {
            memory = memory.metadata(metadata);
        }
        let id = self.store.add(memory).await?;

        let similar = self
            .store
            .similar_to_memory(id, self.config.search.detection_candidates)
            .await?;
        let detected = self.graph.detect(id, &content, &similar);
        let edges = self.graph.link(&detected).await?;

        info!(
            memory_id = %id,
            layer = %class.layer,
            salience = class.salience,
            edges = edges.len(),
            temporal = expires_at.is_some(),
            "memory ingested"
        );
        Ok(IngestOutcome {
            id,
            layer: class.layer,
            salience: class.salience,
            expires_at,
            edges,
        })
    }

    /// Extract memory-worthy statements from `text` and ingest each one.
    pub async fn capture_text(
        &self,
        text: &str,
        min_confidence: f64,
    ) -> Result<Vec<IngestOutcome>, StrataError> {
        let extracted = self.extractor.extract(text, min_confidence);
        let mut outcomes = Vec::with_capacity(extracted.len());
        for memory in extracted {
            let request = IngestRequest::new(memory.content)
                .memory_type(memory.memory_type)
                .base_salience(memory.salience)
                .metadata(serde_json::json!({
                    "source": "capture",
                    "confidence": memory.confidence,
                }));
            outcomes.push(self.ingest(request).await?);
        }
        Ok(outcomes)
    }

    /// Search, then swap superseded hits for their latest versions.
    pub async fn recall(
        &self,
        query: &str,
        limit: usize,
        min_salience: f64,
    ) -> Result<Vec<ResolvedMemory>, StrataError> {
        let hits = self.store.search(query, limit, min_salience).await?;
        self.graph.resolve_all(hits).await
    }

    pub async fn surface(
        &self,
        context: &str,
        limit: usize,
        min_confidence: f64,
    ) -> Result<Vec<SurfacedCandidate>, StrataError> {
        self.surfacer.surface(context, limit, min_confidence).await
    }

    pub async fn startup(&self) -> Result<Vec<SurfacedCandidate>, StrataError> {
        self.surfacer.surface_for_startup().await
    }

    pub async fn startup_context(&self) -> Result<String, StrataError> {
        self.store.startup_context().await
    }

    pub async fn consolidate(
        &self,
        options: ConsolidateOptions,
    ) -> Result<ConsolidationReport, StrataError> {
        self.consolidator.consolidate(options).await
    }

    pub async fn consolidation_candidates(&self) -> Result<ConsolidationPreview, StrataError> {
        self.consolidator.candidates().await
    }

    /// Mark every record past its expiry as superseded.
    pub async fn expire(&self) -> Result<u64, StrataError> {
        self.graph.expire_memories().await
    }

    pub async fn edges(
        &self,
        id: MemoryId,
        direction: Direction,
    ) -> Result<Vec<EdgeView>, StrataError> {
        self.graph.edges(id, direction).await
    }

    pub async fn chain(
        &self,
        id: MemoryId,
        relation: Relation,
    ) -> Result<Vec<MemoryId>, StrataError> {
        self.graph
            .chain(id, relation, self.config.graph.max_chain_depth)
            .await
    }

    pub async fn set_identity(&self, key: &str, value: &str) -> Result<(), StrataError> {
        self.store.set_identity(key, value).await
    }

    pub async fn identity(&self) -> Result<Vec<KvEntry>, StrataError> {
        self.store.identity().await
    }

    pub async fn set_active(&self, key: &str, value: &str) -> Result<(), StrataError> {
        self.store.set_active(key, value).await
    }

    pub async fn active(&self) -> Result<Vec<KvEntry>, StrataError> {
        self.store.active().await
    }

    pub async fn remove_active(&self, key: &str) -> Result<bool, StrataError> {
        self.store.remove_active(key).await
    }

    pub async fn stats(&self) -> Result<EngineStats, StrataError> {
        Ok(EngineStats {
            store: self.store.stats().await?,
            graph: self.graph.stats().await?,
        })
    }

    /// Delete every record, embedding and edge. Key/value context is kept.
    pub async fn clear(&self) -> Result<u64, StrataError> {
        self.store.clear().await
    }

    /// Release the embedding adapter and checkpoint the WAL.
    pub async fn shutdown(&self) -> Result<(), StrataError> {
        self.store.embedder().shutdown().await;
        self.store.database().checkpoint().await
    }
}
