// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pruning of low-value archive records and merging of near-duplicates.
//!
//! A run plans every deletion first and applies the plan in one
//! transaction. A dry run computes the same plan and applies nothing, so
//! its counts match a real run made at the same instant.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use serde::Serialize;
use strata_config::model::ConsolidationConfig;
use strata_core::StrataError;
use strata_storage::timestamp::format_ts;
use strata_storage::map_tr_err;
use tracing::{debug, info};

use crate::index::{NeighborFilter, VectorIndex};
use crate::store::MemoryStore;
use crate::types::{blob_to_vec, MemoryId};

/// Which passes to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConsolidateOptions {
    pub prune: bool,
    pub merge: bool,
    pub dry_run: bool,
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            prune: true,
            merge: true,
            dry_run: false,
        }
    }
}

/// Outcome of one consolidation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidationReport {
    pub before: i64,
    pub after: i64,
    pub pruned: usize,
    pub merged: usize,
    pub duration_ms: f64,
    pub dry_run: bool,
}

/// What a run would touch, without planning merges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidationPreview {
    pub total: i64,
    pub prune_candidates: i64,
    pub by_type: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MergePair {
    keep: MemoryId,
    remove: MemoryId,
}

const PRUNE_PREDICATE: &str = "layer = 'archive'
       AND salience < ?1
       AND created_at < ?2
       AND (access_count = 0 OR access_count IS NULL)";

fn prune_candidates(
    conn: &rusqlite::Connection,
    max_salience: f64,
    cutoff: &str,
) -> rusqlite::Result<Vec<MemoryId>> {
    let sql = format!("SELECT id FROM memories WHERE {PRUNE_PREDICATE} ORDER BY id");
    conn.prepare(&sql)?
        .query_map(params![max_salience, cutoff], |row| Ok(MemoryId(row.get(0)?)))?
        .collect()
}

/// Pairwise merge plan over archive records that have an embedding.
///
/// Records are visited newest first. For each record the index ranks every
/// stored embedding; a later record merges with it when it is among the
/// top `merge_neighbors` still-present neighbours with relevance above
/// `merge_similarity`.
fn plan_merges(
    conn: &rusqlite::Connection,
    index: &dyn VectorIndex,
    pruned: &HashSet<MemoryId>,
    config: &ConsolidationConfig,
) -> rusqlite::Result<Vec<MergePair>> {
    let members: Vec<(MemoryId, f64, Vec<f32>)> = conn
        .prepare(
            "SELECT m.id, m.salience, e.vector
             FROM memories m JOIN memory_embeddings e ON m.id = e.memory_id
             WHERE m.layer = 'archive'
             ORDER BY m.created_at DESC, m.id DESC",
        )?
        .query_map([], |row| {
            Ok((
                MemoryId(row.get(0)?),
                row.get::<_, f64>(1)?,
                blob_to_vec(&row.get::<_, Vec<u8>>(2)?),
            ))
        })?
        .filter(|r| r.as_ref().map_or(true, |(id, _, _)| !pruned.contains(id)))
        .collect::<Result<_, _>>()?;

    if members.len() < 2 {
        return Ok(Vec::new());
    }

    let filter = NeighborFilter {
        min_salience: None,
        exclude: pruned.clone(),
    };
    let mut removed: HashSet<MemoryId> = HashSet::new();
    let mut plan = Vec::new();

    for (i, (first, first_salience, vector)) in members.iter().enumerate() {
        if removed.contains(first) {
            continue;
        }
        let ranked = index.nearest(conn, vector, usize::MAX, &filter)?;
        for (second, second_salience, _) in &members[i + 1..] {
            if removed.contains(second) {
                continue;
            }
            let hit = ranked
                .iter()
                .filter(|n| !removed.contains(&n.id))
                .take(config.merge_neighbors)
                .find(|n| n.id == *second);
            let Some(hit) = hit else {
                continue;
            };
            let relevance = 1.0 - f64::from(hit.distance);
            if relevance <= config.merge_similarity {
                continue;
            }
            let pair = if first_salience >= second_salience {
                MergePair { keep: *first, remove: *second }
            } else {
                MergePair { keep: *second, remove: *first }
            };
            debug!(keep = %pair.keep, remove = %pair.remove, relevance, "merge planned");
            removed.insert(pair.remove);
            plan.push(pair);
            if pair.remove == *first {
                break;
            }
        }
    }
    Ok(plan)
}

fn delete_records(conn: &rusqlite::Connection, ids: &[MemoryId]) -> rusqlite::Result<()> {
    let mut edges =
        conn.prepare_cached("DELETE FROM memory_edges WHERE source_id = ?1 OR target_id = ?1")?;
    let mut embeddings = conn.prepare_cached("DELETE FROM memory_embeddings WHERE memory_id = ?1")?;
    let mut records = conn.prepare_cached("DELETE FROM memories WHERE id = ?1")?;
    for id in ids {
        edges.execute(params![id.0])?;
        embeddings.execute(params![id.0])?;
        records.execute(params![id.0])?;
    }
    Ok(())
}

fn count_memories(conn: &rusqlite::Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
}

/// Runs prune and merge passes against the record store.
pub struct Consolidator {
    store: Arc<MemoryStore>,
    config: ConsolidationConfig,
}

impl Consolidator {
    pub fn new(store: Arc<MemoryStore>, config: ConsolidationConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    pub async fn consolidate(
        &self,
        options: ConsolidateOptions,
    ) -> Result<ConsolidationReport, StrataError> {
        self.consolidate_at(options, Utc::now()).await
    }

    /// Consolidate with ages measured from `now`.
    pub async fn consolidate_at(
        &self,
        options: ConsolidateOptions,
        now: DateTime<Utc>,
    ) -> Result<ConsolidationReport, StrataError> {
        let started = Instant::now();
        let cutoff = self.cutoff(now);
        let now_ts = format_ts(now);
        let index = self.store.index().cloned();
        let config = self.config.clone();

        let (before, after, pruned, merged) = self
            .store
            .database()
            .connection()
            .call(
                move |conn| -> Result<(i64, i64, usize, usize), rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let before = count_memories(&tx)?;

                    let prune_ids = if options.prune {
                        prune_candidates(&tx, config.prune_max_salience, &cutoff)?
                    } else {
                        Vec::new()
                    };
                    let pruned_set: HashSet<MemoryId> = prune_ids.iter().copied().collect();

                    let merges = match (&index, options.merge) {
                        (Some(index), true) => {
                            plan_merges(&tx, index.as_ref(), &pruned_set, &config)?
                        }
                        _ => Vec::new(),
                    };

                    if options.dry_run {
                        return Ok((before, before, prune_ids.len(), merges.len()));
                    }

                    delete_records(&tx, &prune_ids)?;
                    {
                        let mut bump = tx.prepare_cached(
                            "UPDATE memories
                             SET access_count = COALESCE(access_count, 0) + 1, updated_at = ?1
                             WHERE id = ?2",
                        )?;
                        for pair in &merges {
                            bump.execute(params![now_ts, pair.keep.0])?;
                        }
                    }
                    let removed: Vec<MemoryId> = merges.iter().map(|p| p.remove).collect();
                    delete_records(&tx, &removed)?;

                    let after = count_memories(&tx)?;
                    tx.commit()?;
                    Ok((before, after, prune_ids.len(), merges.len()))
                },
            )
            .await
            .map_err(map_tr_err)?;

        let report = ConsolidationReport {
            before,
            after,
            pruned,
            merged,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            dry_run: options.dry_run,
        };
        info!(
            before,
            after,
            pruned,
            merged,
            dry_run = options.dry_run,
            "consolidation finished"
        );
        Ok(report)
    }

    /// Counts a run would start from, without planning merges.
    pub async fn candidates(&self) -> Result<ConsolidationPreview, StrataError> {
        self.candidates_at(Utc::now()).await
    }

    pub async fn candidates_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ConsolidationPreview, StrataError> {
        let cutoff = self.cutoff(now);
        let max_salience = self.config.prune_max_salience;
        self.store
            .database()
            .connection()
            .call(move |conn| -> Result<ConsolidationPreview, rusqlite::Error> {
                let sql = format!("SELECT COUNT(*) FROM memories WHERE {PRUNE_PREDICATE}");
                let prune_candidates =
                    conn.query_row(&sql, params![max_salience, cutoff], |row| row.get(0))?;
                let by_type = conn
                    .prepare("SELECT memory_type, COUNT(*) FROM memories GROUP BY memory_type")?
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<_, _>>()?;
                Ok(ConsolidationPreview {
                    total: count_memories(conn)?,
                    prune_candidates,
                    by_type,
                })
            })
            .await
            .map_err(map_tr_err)
    }

    fn cutoff(&self, now: DateTime<Utc>) -> String {
        let age = Duration::try_days(self.config.prune_min_age_days).unwrap_or(Duration::zero());
        format_ts(now.checked_sub_signed(age).unwrap_or(now))
    }
}
