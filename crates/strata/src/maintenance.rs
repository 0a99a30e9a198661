// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `strata edges`, `expire`, `consolidate` and `stats`.

use std::fmt::Write;

use strata_core::StrataError;
use strata_memory::{ConsolidateOptions, Direction, EdgeSide, MemoryEngine, MemoryId};

use crate::output::{heading, marker, to_json};
use crate::OutputMode;

pub async fn run_edges(
    engine: &MemoryEngine,
    id: MemoryId,
    direction: Direction,
    mode: OutputMode,
) -> Result<String, StrataError> {
    if engine.store().get(id).await?.is_none() {
        return Err(StrataError::NotFound(format!("memory {id}")));
    }
    let edges = engine.edges(id, direction).await?;
    if mode.json {
        return Ok(to_json(&edges));
    }
    if edges.is_empty() {
        return Ok(format!("memory #{id} has no edges"));
    }
    let mut out = heading(&format!("edges of #{id}"), mode.color);
    for view in &edges {
        let e = &view.edge;
        let line = match view.side {
            EdgeSide::Outbound => format!("-> {} #{}", e.relation, e.target_id),
            EdgeSide::Inbound => format!("<- {} #{}", e.relation, e.source_id),
        };
        let _ = write!(
            out,
            "\n    {line} ({:.2}) {}",
            e.confidence, view.connected_preview
        );
    }
    Ok(out)
}

pub async fn run_expire(engine: &MemoryEngine, mode: OutputMode) -> Result<String, StrataError> {
    let expired = engine.expire().await?;
    if mode.json {
        return Ok(to_json(&serde_json::json!({ "expired": expired })));
    }
    Ok(format!("expired {expired} memories"))
}

pub async fn run_consolidate(
    engine: &MemoryEngine,
    options: ConsolidateOptions,
    mode: OutputMode,
) -> Result<String, StrataError> {
    let report = engine.consolidate(options).await?;
    if mode.json {
        return Ok(to_json(&report));
    }
    let title = if report.dry_run {
        "consolidation (dry run)"
    } else {
        "consolidation"
    };
    let mut out = heading(title, mode.color);
    let _ = write!(out, "\n    Before:   {}", report.before);
    let _ = write!(out, "\n    Pruned:   {}", report.pruned);
    let _ = write!(out, "\n    Merged:   {}", report.merged);
    let _ = write!(out, "\n    After:    {}", report.after);
    let _ = write!(out, "\n    Took:     {:.1} ms", report.duration_ms);
    Ok(out)
}

pub async fn run_stats(engine: &MemoryEngine, mode: OutputMode) -> Result<String, StrataError> {
    let stats = engine.stats().await?;
    if mode.json {
        return Ok(to_json(&stats));
    }
    let s = &stats.store;
    let g = &stats.graph;
    let mut out = heading("strata stats", mode.color);
    let _ = write!(out, "\n    Memories:     {}", s.memories);
    for (layer, count) in &s.by_layer {
        let _ = write!(out, "\n      {layer}: {count}");
    }
    let _ = write!(out, "\n    Embeddings:   {}", s.embeddings);
    let _ = write!(out, "\n    Identity:     {} keys", s.identity_keys);
    let _ = write!(out, "\n    Active:       {} keys", s.active_keys);
    let _ = write!(
        out,
        "\n    Vector search {}",
        marker(s.vector_search_available, mode.color)
    );
    let _ = write!(out, "\n    Edges:        {}", g.total_edges);
    for (relation, count) in &g.by_relation {
        let _ = write!(out, "\n      {relation}: {count}");
    }
    let _ = write!(out, "\n    Superseded:   {}", g.superseded_memories);
    let _ = write!(out, "\n    Temporal:     {}", g.temporal_memories);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_config::model::StrataConfig;
    use strata_memory::{EmbeddingCapability, IngestRequest, Relation};
    use strata_test_utils::{memory_database, MockEmbedder};

    const PLAIN: OutputMode = OutputMode {
        json: false,
        color: false,
    };

    async fn engine() -> MemoryEngine {
        let db = memory_database().await.unwrap();
        let cap = EmbeddingCapability::probe(Arc::new(MockEmbedder::new())).await;
        MemoryEngine::new(db, cap, &StrataConfig::default())
    }

    #[tokio::test]
    async fn edges_of_unknown_memory_is_not_found() {
        let engine = engine().await;
        let err = run_edges(&engine, MemoryId(99), Direction::Both, PLAIN)
            .await
            .unwrap_err();
        assert!(matches!(err, StrataError::NotFound(_)));
    }

    #[tokio::test]
    async fn edges_render_both_sides() {
        let engine = engine().await;
        let a = engine.ingest(IngestRequest::new("first note")).await.unwrap().id;
        let b = engine.ingest(IngestRequest::new("second note")).await.unwrap().id;
        engine
            .graph()
            .add_edge(b, a, Relation::Extends, 0.7, None)
            .await
            .unwrap();
        let out = run_edges(&engine, a, Direction::Both, PLAIN).await.unwrap();
        assert!(out.contains("<- extends #2 (0.70) second note"));
        let out = run_edges(&engine, b, Direction::Outbound, PLAIN).await.unwrap();
        assert!(out.contains("-> extends #1 (0.70) first note"));
    }

    #[tokio::test]
    async fn stats_and_consolidate_render() {
        let engine = engine().await;
        engine.ingest(IngestRequest::new("a fact")).await.unwrap();
        let out = run_stats(&engine, PLAIN).await.unwrap();
        assert!(out.contains("Memories:     1"));
        assert!(out.contains("Vector search [OK]"));

        let out = run_consolidate(
            &engine,
            ConsolidateOptions {
                dry_run: true,
                ..Default::default()
            },
            PLAIN,
        )
        .await
        .unwrap();
        assert!(out.contains("consolidation (dry run)"));
        assert!(out.contains("Before:   1"));
    }

    #[tokio::test]
    async fn expire_reports_count_as_json() {
        let engine = engine().await;
        let out = run_expire(
            &engine,
            OutputMode {
                json: true,
                color: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(out, "{\n  \"expired\": 0\n}");
    }
}
