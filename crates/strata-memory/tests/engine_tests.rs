// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios through `MemoryEngine`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use strata_config::model::StrataConfig;
use strata_memory::{
    ConsolidateOptions, Direction, EmbeddingCapability, IngestRequest, Layer, MemoryEngine,
    NewMemory, Relation,
};
use strata_test_utils::{memory_database, temp_database, MockEmbedder};

const SQLITE: &str = "We decided to use SQLite for storage";
const POSTGRES: &str = "Actually, we switched to Postgres for storage";

async fn engine_with(embedder: Option<MockEmbedder>) -> MemoryEngine {
    let db = memory_database().await.unwrap();
    let cap = match embedder {
        Some(e) => EmbeddingCapability::probe(Arc::new(e)).await,
        None => EmbeddingCapability::none(),
    };
    MemoryEngine::new(db, cap, &StrataConfig::default())
}

/// Two vectors at cosine similarity 0.8.
fn storage_embedder() -> MockEmbedder {
    MockEmbedder::new()
        .with_vector(SQLITE, vec![1.0, 0.0])
        .with_vector(POSTGRES, vec![0.8, 0.6])
}

#[tokio::test]
async fn contradicting_update_supersedes_older_record() {
    let engine = engine_with(Some(storage_embedder())).await;
    let first = engine.ingest(IngestRequest::new(SQLITE)).await.unwrap();
    let second = engine.ingest(IngestRequest::new(POSTGRES)).await.unwrap();

    assert_eq!(second.edges.len(), 1);
    let edge = &second.edges[0];
    assert_eq!(edge.relation, Relation::Updates);
    assert_eq!(edge.source_id, second.id);
    assert_eq!(edge.target_id, first.id);
    // "actually" boosts update confidence by 0.15
    assert!((edge.confidence - 0.95).abs() < 1e-3);

    let old = engine.store().get(first.id).await.unwrap().unwrap();
    assert!(!old.is_latest);
    let new = engine.store().get(second.id).await.unwrap().unwrap();
    assert!(new.is_latest);
}

#[tokio::test]
async fn recall_resolves_to_latest_version() {
    let engine = engine_with(Some(storage_embedder())).await;
    let first = engine.ingest(IngestRequest::new(SQLITE)).await.unwrap();
    let second = engine.ingest(IngestRequest::new(POSTGRES)).await.unwrap();

    let results = engine.recall(SQLITE, 5, 0.0).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.id, second.id);
    assert_eq!(results[0].record.content, POSTGRES);
    assert_eq!(results[0].supersedes, Some(first.id));
}

#[tokio::test]
async fn chain_follows_updates() {
    let engine = engine_with(Some(storage_embedder())).await;
    let first = engine.ingest(IngestRequest::new(SQLITE)).await.unwrap();
    let second = engine.ingest(IngestRequest::new(POSTGRES)).await.unwrap();

    let chain = engine.chain(second.id, Relation::Updates).await.unwrap();
    assert_eq!(chain, vec![second.id, first.id]);

    let inbound = engine.edges(first.id, Direction::Inbound).await.unwrap();
    assert_eq!(inbound.len(), 1);
    assert_eq!(inbound[0].connected_preview, POSTGRES);
}

#[tokio::test]
async fn exact_content_search_returns_record_first() {
    let engine = engine_with(Some(MockEmbedder::new())).await;
    engine
        .ingest(IngestRequest::new("lunch is at noon on fridays"))
        .await
        .unwrap();
    let target = engine
        .ingest(IngestRequest::new("the staging cluster runs in eu-west-1"))
        .await
        .unwrap();
    engine
        .ingest(IngestRequest::new("coffee machine is on floor three"))
        .await
        .unwrap();

    let hits = engine
        .store()
        .search("the staging cluster runs in eu-west-1", 3, 0.0)
        .await
        .unwrap();
    assert_eq!(hits[0].record.id, target.id);
    assert!(hits[0].relevance > 0.99);
}

#[tokio::test]
async fn keyword_mode_still_works_end_to_end() {
    let engine = engine_with(None).await;
    let out = engine
        .ingest(IngestRequest::new("The invoice total is $420"))
        .await
        .unwrap();
    assert!(out.edges.is_empty());

    let results = engine.recall("invoice", 5, 0.0).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.id, out.id);

    let stats = engine.stats().await.unwrap();
    assert!(!stats.store.embeddings_available);
    assert!(!stats.store.vector_search_available);
}

#[tokio::test]
async fn entity_mention_is_surfaced() {
    let engine = engine_with(None).await;
    let bill = engine
        .ingest(IngestRequest::new("Bill likes quarterly reports"))
        .await
        .unwrap();

    let surfaced = engine
        .surface("Bill mentioned the pricing plan", 5, 0.3)
        .await
        .unwrap();
    let hit = surfaced.iter().find(|c| c.record_id == bill.id).unwrap();
    assert!((hit.confidence - 0.85).abs() < f64::EPSILON);
    assert!(hit.tags.contains(&"entity:person".to_string()));
}

#[tokio::test]
async fn temporal_content_expires() {
    let engine = engine_with(None).await;
    let past = Utc::now() - Duration::days(3);
    let out = engine
        .ingest_at(IngestRequest::new("Dentist appointment tomorrow at 9"), past)
        .await
        .unwrap();
    assert!(out.expires_at.unwrap() < Utc::now());

    let expired = engine.expire().await.unwrap();
    assert_eq!(expired, 1);
    let record = engine.store().get(out.id).await.unwrap().unwrap();
    assert!(!record.is_latest);
    assert_eq!(engine.stats().await.unwrap().graph.temporal_memories, 1);
}

#[tokio::test]
async fn identity_content_routes_to_identity_layer() {
    let engine = engine_with(None).await;
    let out = engine
        .ingest(IngestRequest::new("My name is Strata and I am an agent"))
        .await
        .unwrap();
    assert_eq!(out.layer, Layer::Identity);
    let out = engine
        .ingest(IngestRequest::new("Fix the login bug").memory_type("task"))
        .await
        .unwrap();
    assert_eq!(out.layer, Layer::Active);
}

#[tokio::test]
async fn consolidation_prunes_stale_price_but_keeps_fresh_one() {
    let engine = engine_with(None).await;
    let now = Utc::now();
    let stale = engine
        .store()
        .add(
            NewMemory::new("price is $10")
                .salience(0.3)
                .created_at(now - Duration::days(10)),
        )
        .await
        .unwrap();
    let fresh = engine
        .store()
        .add(NewMemory::new("price is $10").salience(0.3))
        .await
        .unwrap();

    let dry = engine
        .consolidate(ConsolidateOptions {
            dry_run: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(dry.pruned, 1);
    assert_eq!(engine.stats().await.unwrap().store.memories, 2);

    let real = engine
        .consolidate(ConsolidateOptions::default())
        .await
        .unwrap();
    assert_eq!(real.before, dry.before);
    assert_eq!(real.pruned, dry.pruned);
    assert_eq!(real.after, 1);
    assert!(engine.store().get(stale).await.unwrap().is_none());
    assert!(engine.store().get(fresh).await.unwrap().is_some());
}

#[tokio::test]
async fn startup_uses_active_task_and_decisions() {
    let engine = engine_with(None).await;
    engine
        .ingest(IngestRequest::new("migration plan: move billing to the new schema"))
        .await
        .unwrap();
    engine
        .ingest(IngestRequest::new("We decided to freeze deploys on Fridays").memory_type("decision"))
        .await
        .unwrap();
    engine.set_active("current_task", "migration").await.unwrap();
    engine.set_identity("name", "Strata").await.unwrap();

    let surfaced = engine.startup().await.unwrap();
    assert_eq!(surfaced[0].reason, "active task context");
    assert!(surfaced.iter().any(|c| c.reason == "recent decision"));

    let context = engine.startup_context().await.unwrap();
    assert!(context.starts_with("# Identity\n- name: Strata\n"));
    assert!(context.contains("# Active Context\n## current_task\nmigration"));
}

#[tokio::test]
async fn capture_then_clear() {
    let engine = engine_with(Some(MockEmbedder::new())).await;
    let outcomes = engine
        .capture_text(
            "We decided to pivot to memory. I prefer semantic search over keywords. ok.",
            0.3,
        )
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);

    engine.set_active("current_task", "cleanup").await.unwrap();
    let removed = engine.clear().await.unwrap();
    assert_eq!(removed, 2);
    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.store.memories, 0);
    assert_eq!(stats.store.embeddings, 0);
    assert_eq!(stats.store.active_keys, 1);
}

#[tokio::test]
async fn on_disk_engine_survives_reopen() {
    let (dir, db) = temp_database().await.unwrap();
    let engine = MemoryEngine::new(db, EmbeddingCapability::none(), &StrataConfig::default());
    let id = engine
        .ingest(IngestRequest::new("persisted across restarts"))
        .await
        .unwrap()
        .id;
    engine.shutdown().await.unwrap();
    drop(engine);

    let mut config = StrataConfig::default();
    config.storage.database_path = dir.path().join("strata.db").to_string_lossy().into_owned();
    config.embedding.enabled = false;
    let reopened = MemoryEngine::open(&config).await.unwrap();
    let record = reopened.store().get(id).await.unwrap().unwrap();
    assert_eq!(record.content, "persisted across restarts");
}
