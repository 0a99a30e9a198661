// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relationship graph between memory records.
//!
//! Edges point from a newer record (source) to an older one (target):
//!
//! - `updates`: the source replaces the target, which stops being latest
//! - `extends`: the source adds detail to the target
//! - `derives`: the source is loosely inferred from the target
//!
//! Detection is heuristic and pure. Persistence, resolution of superseded
//! records and temporal expiry run against the shared database.

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};
use strata_config::model::GraphConfig;
use strata_core::StrataError;
use strata_storage::timestamp::{format_ts, now_ts};
use strata_storage::{map_tr_err, Database};
use tracing::{debug, info};

use crate::patterns::{any_match, compile_all};
use crate::store::load_record;
use crate::types::{
    preview, DetectedRelation, Edge, EdgeSide, EdgeView, Direction, Extension, GraphStats,
    MemoryId, MemoryRecord, Relation, ResolvedMemory, ScoredMemory,
};

const CONTRADICTION_PATTERNS: &[&str] = &[
    r"\b(actually|no longer|not|isn't|wasn't|changed to|moved to|switched to|now)\b",
    r"\b(instead of|rather than|correcting|correction|update[ds]?)\b",
    r"\b(used to|previously|formerly|was|were)\b",
];

const EXTENSION_PATTERNS: &[&str] = &[
    r"\b(also|additionally|furthermore|moreover|plus)\b",
    r"\b(specifically|in particular|for example|e\.g\.)\b",
    r"\b(details|more about|expanding on)\b",
];

/// Thresholds and vocabularies for relationship detection.
#[derive(Debug, Clone)]
pub struct RelationRules {
    pub update_threshold: f64,
    pub extend_high_threshold: f64,
    pub extend_threshold: f64,
    pub derive_threshold: f64,
    pub contradiction: Vec<Regex>,
    pub numeric: Vec<Regex>,
    pub extension: Vec<Regex>,
    /// Matched against the original-case text.
    pub capitalized: Vec<Regex>,
    /// Recurring subjects, matched against lower-cased text.
    pub known_subjects: Vec<Regex>,
    pub update_boost: Vec<Regex>,
    pub extend_boost: Vec<Regex>,
}

impl Default for RelationRules {
    fn default() -> Self {
        Self {
            update_threshold: 0.72,
            extend_high_threshold: 0.85,
            extend_threshold: 0.65,
            derive_threshold: 0.45,
            contradiction: compile_all(CONTRADICTION_PATTERNS),
            numeric: compile_all(&[r"\$?\d+\.?\d*"]),
            extension: compile_all(EXTENSION_PATTERNS),
            capitalized: compile_all(&[r"\b[A-Z][a-z]+\b"]),
            known_subjects: compile_all(&[r"\b(?:bill|alex|the project|the app|capybot)\b"]),
            update_boost: compile_all(&[r"\b(actually|no longer|changed|correction)\b"]),
            extend_boost: compile_all(&[r"\b(also|additionally|specifically)\b"]),
        }
    }
}

fn words(text: &str) -> HashSet<&str> {
    text.split_whitespace().collect()
}

fn leading_words(text: &str) -> HashSet<&str> {
    text.split_whitespace().take(8).collect()
}

fn matches<'t>(patterns: &[Regex], text: &'t str) -> HashSet<&'t str> {
    patterns
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.as_str()))
        .collect()
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

impl RelationRules {
    /// Relation from `new` to `existing`, first matching rule wins.
    pub fn classify(&self, new: &str, existing: &str, similarity: f64) -> Option<Relation> {
        let new_lower = new.to_lowercase();
        let existing_lower = existing.to_lowercase();

        if similarity >= self.update_threshold {
            if self.contradicts(&new_lower, &existing_lower) {
                return Some(Relation::Updates);
            }
            if similarity >= self.extend_high_threshold
                && new.chars().count() as f64 > existing.chars().count() as f64 * 0.5
            {
                return Some(Relation::Extends);
            }
        }

        if similarity >= self.extend_threshold {
            if self.contradicts(&new_lower, &existing_lower) && self.shares_subject(new, existing) {
                return Some(Relation::Updates);
            }
            if any_match(&self.extension, &new_lower) {
                return Some(Relation::Extends);
            }
            if self.shares_subject(new, existing) && has_new_information(&new_lower, &existing_lower)
            {
                return Some(Relation::Extends);
            }
        }

        if (self.derive_threshold..self.extend_threshold).contains(&similarity)
            && has_inferrable_connection(&new_lower, &existing_lower)
        {
            return Some(Relation::Derives);
        }

        None
    }

    /// Contradiction language with a shared lead-in, or changed numbers
    /// with a strongly shared lead-in. Both inputs lower-cased.
    pub fn contradicts(&self, new: &str, existing: &str) -> bool {
        let new_lead = leading_words(new);
        let existing_lead = leading_words(existing);
        let shared = new_lead.intersection(&existing_lead).count() as f64
            / new_lead.len().max(1) as f64;

        if any_match(&self.contradiction, new) && shared > 0.3 {
            return true;
        }

        let new_numbers = matches(&self.numeric, new);
        let existing_numbers = matches(&self.numeric, existing);
        !new_numbers.is_empty()
            && !existing_numbers.is_empty()
            && new_numbers != existing_numbers
            && shared > 0.4
    }

    /// A common capitalized token or recurring subject.
    pub fn shares_subject(&self, new: &str, existing: &str) -> bool {
        let subjects = |text: &str| -> HashSet<String> {
            let mut found: HashSet<String> =
                matches(&self.capitalized, text).into_iter().map(str::to_string).collect();
            let lower = text.to_lowercase();
            found.extend(matches(&self.known_subjects, &lower).into_iter().map(str::to_string));
            found
        };
        let a = subjects(new);
        let b = subjects(existing);
        !a.is_empty() && !b.is_empty() && !a.is_disjoint(&b)
    }

    /// Edge confidence, rounded to three decimals.
    pub fn confidence(&self, relation: Relation, similarity: f64, new: &str) -> f64 {
        let lower = new.to_lowercase();
        let value = match relation {
            Relation::Updates if any_match(&self.update_boost, &lower) => {
                (similarity + 0.15).min(1.0)
            }
            Relation::Extends if any_match(&self.extend_boost, &lower) => {
                (similarity + 0.1).min(1.0)
            }
            Relation::Derives => similarity * 0.7,
            _ => similarity,
        };
        round3(value)
    }
}

fn has_new_information(new: &str, existing: &str) -> bool {
    let new_words = words(new);
    let existing_words = words(existing);
    let novel = new_words.difference(&existing_words).count();
    novel as f64 / new_words.len().max(1) as f64 > 0.3
}

fn has_inferrable_connection(new: &str, existing: &str) -> bool {
    let new_words = words(new);
    let existing_words = words(existing);
    let smaller = new_words.len().min(existing_words.len()).max(1);
    let overlap = new_words.intersection(&existing_words).count() as f64 / smaller as f64;
    overlap > 0.15 && overlap < 0.5
}

const EDGE_COLUMNS: &str =
    "e.id, e.source_id, e.target_id, e.relation, e.confidence, e.created_at, e.metadata";

fn row_to_edge(row: &rusqlite::Row<'_>) -> rusqlite::Result<Edge> {
    let relation: String = row.get(3)?;
    let relation = Relation::from_str(&relation)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let metadata: Option<String> = row.get(6)?;
    Ok(Edge {
        id: row.get(0)?,
        source_id: MemoryId(row.get(1)?),
        target_id: MemoryId(row.get(2)?),
        relation,
        confidence: row.get(4)?,
        created_at: row.get(5)?,
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
    })
}

fn memory_exists(conn: &rusqlite::Connection, id: MemoryId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM memories WHERE id = ?1)",
        params![id.0],
        |row| row.get(0),
    )
}

pub(crate) fn extensions_of(
    conn: &rusqlite::Connection,
    id: MemoryId,
) -> rusqlite::Result<Vec<Extension>> {
    conn.prepare_cached(
        "SELECT m.id, m.content, m.memory_type, m.created_at, e.confidence
         FROM memory_edges e JOIN memories m ON e.source_id = m.id
         WHERE e.target_id = ?1 AND e.relation = 'extends'
         ORDER BY e.confidence DESC, e.id",
    )?
    .query_map(params![id.0], |row| {
        Ok(Extension {
            id: MemoryId(row.get(0)?),
            content: row.get(1)?,
            memory_type: row.get(2)?,
            created_at: row.get(3)?,
            confidence: row.get(4)?,
        })
    })?
    .collect()
}

/// Walk `updates` edges back from a superseded record to a latest one.
fn latest_successor(
    conn: &rusqlite::Connection,
    id: MemoryId,
    max_depth: usize,
) -> rusqlite::Result<Option<MemoryRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT source_id FROM memory_edges
         WHERE target_id = ?1 AND relation = 'updates'
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
    )?;
    let mut visited = HashSet::from([id]);
    let mut current = id;
    for _ in 0..max_depth {
        let Some(next) = stmt
            .query_row(params![current.0], |row| Ok(MemoryId(row.get(0)?)))
            .optional()?
        else {
            return Ok(None);
        };
        if !visited.insert(next) {
            return Ok(None);
        }
        let Some(record) = load_record(conn, next)? else {
            return Ok(None);
        };
        if record.is_latest {
            return Ok(Some(record));
        }
        current = next;
    }
    Ok(None)
}

fn resolve_in(
    conn: &rusqlite::Connection,
    candidates: Vec<ScoredMemory>,
    max_depth: usize,
    preview_chars: usize,
) -> rusqlite::Result<Vec<ResolvedMemory>> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let original = candidate.record.id;
        if !seen.insert(original) {
            continue;
        }
        // The stored flag wins over a possibly stale candidate.
        let is_latest = load_record(conn, original)?
            .map(|r| r.is_latest)
            .unwrap_or(candidate.record.is_latest);

        let (record, supersedes) = if is_latest {
            (candidate.record, None)
        } else {
            match latest_successor(conn, original, max_depth)? {
                Some(latest) => (latest, Some(original)),
                None => {
                    debug!(id = %original, "superseded memory has no latest successor, dropped");
                    continue;
                }
            }
        };
        if supersedes.is_some() && !seen.insert(record.id) {
            continue;
        }

        let extensions = extensions_of(conn, record.id)?;
        let extended_context = (!extensions.is_empty()).then(|| {
            extensions
                .iter()
                .take(3)
                .map(|e| preview(&e.content, preview_chars))
                .collect::<Vec<_>>()
                .join("; ")
        });
        resolved.push(ResolvedMemory {
            record,
            relevance: candidate.relevance,
            supersedes,
            extensions,
            extended_context,
        });
    }
    Ok(resolved)
}

/// Edge persistence, traversal and temporal expiry.
pub struct MemoryGraph {
    db: Database,
    rules: RelationRules,
    config: GraphConfig,
}

impl MemoryGraph {
    pub fn new(db: Database, config: GraphConfig) -> Self {
        Self {
            db,
            rules: RelationRules::default(),
            config,
        }
    }

    pub fn with_rules(mut self, rules: RelationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &RelationRules {
        &self.rules
    }

    /// Classify `new_content` against each similar record. Pure.
    pub fn detect(
        &self,
        new_id: MemoryId,
        new_content: &str,
        similar: &[ScoredMemory],
    ) -> Vec<DetectedRelation> {
        similar
            .iter()
            .filter(|s| s.record.id != new_id)
            .filter_map(|s| {
                let relation = self
                    .rules
                    .classify(new_content, &s.record.content, s.relevance)?;
                Some(DetectedRelation {
                    source_id: new_id,
                    target_id: s.record.id,
                    relation,
                    confidence: self.rules.confidence(relation, s.relevance, new_content),
                    target_preview: preview(&s.record.content, self.config.preview_chars),
                })
            })
            .collect()
    }

    /// Insert or refresh the edge keyed by (source, target, relation).
    ///
    /// An `updates` edge marks the target superseded in the same transaction.
    pub async fn add_edge(
        &self,
        source: MemoryId,
        target: MemoryId,
        relation: Relation,
        confidence: f64,
        metadata: Option<serde_json::Value>,
    ) -> Result<Edge, StrataError> {
        if source == target {
            return Err(StrataError::InvalidEdge(format!(
                "memory {source} cannot relate to itself"
            )));
        }
        let metadata_json = metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StrataError::Internal(format!("edge metadata serialization: {e}")))?;
        let now = now_ts();

        let edge = self
            .db
            .connection()
            .call(
                move |conn| -> Result<Result<Edge, StrataError>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    for id in [source, target] {
                        if !memory_exists(&tx, id)? {
                            return Ok(Err(StrataError::InvalidEdge(format!(
                                "memory {id} does not exist"
                            ))));
                        }
                    }
                    let (id, created_at): (i64, String) = tx.query_row(
                        "INSERT INTO memory_edges
                            (source_id, target_id, relation, confidence, created_at, metadata)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                         ON CONFLICT(source_id, target_id, relation) DO UPDATE SET
                            confidence = excluded.confidence,
                            created_at = excluded.created_at,
                            metadata = excluded.metadata
                         RETURNING id, created_at",
                        params![
                            source.0,
                            target.0,
                            relation.to_string(),
                            confidence,
                            now,
                            metadata_json
                        ],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )?;
                    if relation == Relation::Updates {
                        tx.execute(
                            "UPDATE memories SET is_latest = 0 WHERE id = ?1",
                            params![target.0],
                        )?;
                    }
                    tx.commit()?;
                    Ok(Ok(Edge {
                        id,
                        source_id: source,
                        target_id: target,
                        relation,
                        confidence,
                        created_at,
                        metadata,
                    }))
                },
            )
            .await
            .map_err(map_tr_err)??;

        info!(
            source = %edge.source_id,
            target = %edge.target_id,
            relation = %edge.relation,
            confidence = edge.confidence,
            "memory edge recorded"
        );
        Ok(edge)
    }

    /// Persist detected relations, one transaction per edge.
    pub async fn link(&self, detected: &[DetectedRelation]) -> Result<Vec<Edge>, StrataError> {
        let mut edges = Vec::with_capacity(detected.len());
        for d in detected {
            edges.push(
                self.add_edge(d.source_id, d.target_id, d.relation, d.confidence, None)
                    .await?,
            );
        }
        Ok(edges)
    }

    /// Edges touching `id`, each with a preview of the record on the other end.
    pub async fn edges(&self, id: MemoryId, direction: Direction) -> Result<Vec<EdgeView>, StrataError> {
        let preview_chars = self.config.preview_chars;
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<EdgeView>, rusqlite::Error> {
                let mut views = Vec::new();
                let queries = [
                    (
                        EdgeSide::Outbound,
                        matches!(direction, Direction::Outbound | Direction::Both),
                        "JOIN memories m ON e.target_id = m.id WHERE e.source_id = ?1",
                    ),
                    (
                        EdgeSide::Inbound,
                        matches!(direction, Direction::Inbound | Direction::Both),
                        "JOIN memories m ON e.source_id = m.id WHERE e.target_id = ?1",
                    ),
                ];
                for (side, wanted, tail) in queries {
                    if !wanted {
                        continue;
                    }
                    let sql = format!(
                        "SELECT {EDGE_COLUMNS}, m.content FROM memory_edges e {tail}
                         ORDER BY e.created_at, e.id"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(params![id.0], |row| {
                        let content: String = row.get(7)?;
                        Ok(EdgeView {
                            edge: row_to_edge(row)?,
                            side,
                            connected_preview: preview(&content, preview_chars),
                        })
                    })?;
                    for view in rows {
                        views.push(view?);
                    }
                }
                Ok(views)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Follow outbound `relation` edges from `id`, newest edge first at each hop.
    ///
    /// The returned chain starts with `id` and stops at a cycle.
    pub async fn chain(
        &self,
        id: MemoryId,
        relation: Relation,
        max_depth: usize,
    ) -> Result<Vec<MemoryId>, StrataError> {
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<MemoryId>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT target_id FROM memory_edges
                     WHERE source_id = ?1 AND relation = ?2
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1",
                )?;
                let mut chain = vec![id];
                let mut current = id;
                for _ in 0..max_depth {
                    let next = stmt
                        .query_row(params![current.0, relation.to_string()], |row| {
                            Ok(MemoryId(row.get(0)?))
                        })
                        .optional()?;
                    match next {
                        Some(next) if !chain.contains(&next) => {
                            chain.push(next);
                            current = next;
                        }
                        _ => break,
                    }
                }
                Ok(chain)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Records extending `id`, highest confidence first.
    pub async fn extensions(&self, id: MemoryId) -> Result<Vec<Extension>, StrataError> {
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<Extension>, rusqlite::Error> {
                extensions_of(conn, id)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Replace superseded results with their latest successors and attach
    /// extension context. Results without a reachable successor are dropped.
    pub async fn resolve_all(
        &self,
        candidates: Vec<ScoredMemory>,
    ) -> Result<Vec<ResolvedMemory>, StrataError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let max_depth = self.config.max_chain_depth;
        let preview_chars = self.config.preview_chars;
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<ResolvedMemory>, rusqlite::Error> {
                resolve_in(conn, candidates, max_depth, preview_chars)
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn resolve(
        &self,
        candidate: ScoredMemory,
    ) -> Result<Option<ResolvedMemory>, StrataError> {
        Ok(self.resolve_all(vec![candidate]).await?.pop())
    }

    /// Set or clear the expiry of a record. Returns false for an unknown id.
    pub async fn set_expiry(
        &self,
        id: MemoryId,
        at: Option<DateTime<Utc>>,
    ) -> Result<bool, StrataError> {
        let at = at.map(format_ts);
        self.db
            .connection()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let n = conn.execute(
                    "UPDATE memories SET expires_at = ?1 WHERE id = ?2",
                    params![at, id.0],
                )?;
                Ok(n > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Mark latest records whose expiry has passed as no longer latest.
    pub async fn expire_memories(&self) -> Result<u64, StrataError> {
        self.expire_memories_at(Utc::now()).await
    }

    pub async fn expire_memories_at(&self, now: DateTime<Utc>) -> Result<u64, StrataError> {
        let now = format_ts(now);
        let expired = self
            .db
            .connection()
            .call(move |conn| -> Result<u64, rusqlite::Error> {
                let n = conn.execute(
                    "UPDATE memories SET is_latest = 0
                     WHERE expires_at IS NOT NULL AND expires_at < ?1 AND is_latest = 1",
                    params![now],
                )?;
                Ok(n as u64)
            })
            .await
            .map_err(map_tr_err)?;
        if expired > 0 {
            info!(expired, "time-bound memories expired");
        }
        Ok(expired)
    }

    pub async fn stats(&self) -> Result<GraphStats, StrataError> {
        self.db
            .connection()
            .call(|conn| -> Result<GraphStats, rusqlite::Error> {
                let count = |sql: &str| conn.query_row(sql, [], |row| row.get::<_, i64>(0));
                let by_relation: BTreeMap<String, i64> = conn
                    .prepare("SELECT relation, COUNT(*) FROM memory_edges GROUP BY relation")?
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<_, _>>()?;
                let avg: Option<f64> =
                    conn.query_row("SELECT AVG(confidence) FROM memory_edges", [], |row| {
                        row.get(0)
                    })?;
                Ok(GraphStats {
                    total_edges: count("SELECT COUNT(*) FROM memory_edges")?,
                    by_relation,
                    superseded_memories: count("SELECT COUNT(*) FROM memories WHERE is_latest = 0")?,
                    temporal_memories: count(
                        "SELECT COUNT(*) FROM memories WHERE expires_at IS NOT NULL",
                    )?,
                    avg_confidence: round3(avg.unwrap_or(0.0)),
                })
            })
            .await
            .map_err(map_tr_err)
    }
}
