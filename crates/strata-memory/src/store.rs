// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed record store with vector search and keyword fallback.
//!
//! Embeddings are computed outside the database thread, then the record and
//! its vector are written in one transaction. Search ranks by cosine
//! distance when both an embedding and a vector index are available and
//! falls back to case-insensitive substring matching otherwise.

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};
use strata_core::StrataError;
use strata_storage::queries::kv;
use strata_storage::timestamp::{format_ts, now_ts};
use strata_storage::{map_tr_err, Database, KvEntry, KvTable};
use tracing::debug;

use crate::capability::EmbeddingCapability;
use crate::index::{ExactCosineIndex, NeighborFilter, VectorIndex};
use crate::types::{
    vec_to_blob, blob_to_vec, Layer, MemoryId, MemoryRecord, NewMemory, ScoredMemory, StoreStats,
};

/// Relevance reported for keyword-path results.
pub const KEYWORD_RELEVANCE: f64 = 0.5;

pub(crate) const RECORD_COLUMNS: &str = "m.id, m.content, m.layer, m.memory_type, m.salience, \
     m.created_at, m.updated_at, m.accessed_at, m.access_count, m.metadata, m.is_latest, m.expires_at";

/// Map a row selected with [`RECORD_COLUMNS`].
pub(crate) fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let layer: String = row.get(2)?;
    let layer = Layer::from_str(&layer)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let metadata: Option<String> = row.get(9)?;
    Ok(MemoryRecord {
        id: MemoryId(row.get(0)?),
        content: row.get(1)?,
        layer,
        memory_type: row.get(3)?,
        salience: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        accessed_at: row.get(7)?,
        access_count: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        is_latest: row.get::<_, i64>(10)? != 0,
        expires_at: row.get(11)?,
    })
}

pub(crate) fn load_record(
    conn: &rusqlite::Connection,
    id: MemoryId,
) -> rusqlite::Result<Option<MemoryRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM memories m WHERE m.id = ?1");
    conn.prepare_cached(&sql)?
        .query_row(params![id.0], row_to_record)
        .optional()
}

fn load_records(
    conn: &rusqlite::Connection,
    ids: &[MemoryId],
) -> rusqlite::Result<Vec<MemoryRecord>> {
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(record) = load_record(conn, *id)? {
            records.push(record);
        }
    }
    Ok(records)
}

fn record_access(conn: &rusqlite::Connection, ids: &[MemoryId], now: &str) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "UPDATE memories SET accessed_at = ?1, access_count = COALESCE(access_count, 0) + 1
         WHERE id = ?2",
    )?;
    for id in ids {
        stmt.execute(params![now, id.0])?;
    }
    Ok(())
}

pub(crate) fn embedding_for(
    conn: &rusqlite::Connection,
    id: MemoryId,
) -> rusqlite::Result<Option<Vec<f32>>> {
    conn.prepare_cached("SELECT vector FROM memory_embeddings WHERE memory_id = ?1")?
        .query_row(params![id.0], |row| row.get::<_, Vec<u8>>(0))
        .optional()
        .map(|blob| blob.map(|b| blob_to_vec(&b)))
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn keyword_hits(
    conn: &rusqlite::Connection,
    query: &str,
    limit: usize,
    min_salience: f64,
) -> rusqlite::Result<Vec<MemoryId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM memories
         WHERE content LIKE ?1 ESCAPE '\\' AND salience >= ?2
         ORDER BY created_at DESC, id DESC
         LIMIT ?3",
    )?;
    stmt.query_map(params![like_pattern(query), min_salience, limit as i64], |row| {
        Ok(MemoryId(row.get(0)?))
    })?
    .collect()
}

/// Persistent store for memory records, their embeddings and the
/// identity / active-context tables.
pub struct MemoryStore {
    db: Database,
    embedder: EmbeddingCapability,
    index: Option<Arc<dyn VectorIndex>>,
}

impl MemoryStore {
    /// A store using the exact cosine index.
    pub fn new(db: Database, embedder: EmbeddingCapability) -> Self {
        Self {
            db,
            embedder,
            index: Some(Arc::new(ExactCosineIndex)),
        }
    }

    /// Replace (or remove) the vector index.
    pub fn with_index(mut self, index: Option<Arc<dyn VectorIndex>>) -> Self {
        self.index = index;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn embedder(&self) -> &EmbeddingCapability {
        &self.embedder
    }

    pub fn index(&self) -> Option<&Arc<dyn VectorIndex>> {
        self.index.as_ref()
    }

    pub fn embeddings_available(&self) -> bool {
        self.embedder.is_available()
    }

    pub fn vector_search_available(&self) -> bool {
        self.index.is_some() && self.embedder.is_available()
    }

    /// Persist a record, and its embedding when one can be computed.
    pub async fn add(&self, memory: NewMemory) -> Result<MemoryId, StrataError> {
        let vector = self.embedder.embed(&memory.content).await.into_vector();
        let now = now_ts();
        let created_at = memory.created_at.map(format_ts).unwrap_or_else(|| now.clone());
        let expires_at = memory.expires_at.map(format_ts);
        let metadata = memory
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StrataError::Internal(format!("metadata serialization: {e}")))?;
        let salience = memory.salience.clamp(0.0, 1.0);
        let layer = memory.layer.to_string();
        let content = memory.content;
        let memory_type = memory.memory_type;

        let id = self
            .db
            .connection()
            .call(move |conn| -> Result<MemoryId, rusqlite::Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO memories
                        (content, layer, memory_type, salience, created_at, updated_at,
                         access_count, metadata, is_latest, expires_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5, 0, ?6, 1, ?7)",
                    params![content, layer, memory_type, salience, created_at, metadata, expires_at],
                )?;
                let id = MemoryId(tx.last_insert_rowid());
                if let Some(v) = vector {
                    tx.execute(
                        "INSERT INTO memory_embeddings (memory_id, vector, dimensions)
                         VALUES (?1, ?2, ?3)",
                        params![id.0, vec_to_blob(&v), v.len() as i64],
                    )?;
                }
                tx.commit()?;
                Ok(id)
            })
            .await
            .map_err(map_tr_err)?;
        debug!(%id, "memory stored");
        Ok(id)
    }

    /// Ranked retrieval. Every returned record has its access recorded.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        min_salience: f64,
    ) -> Result<Vec<ScoredMemory>, StrataError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let vector = if self.vector_search_available() {
            self.embedder.embed(query).await.into_vector()
        } else {
            None
        };
        let index = self.index.clone();
        let query = query.to_string();
        let now = now_ts();

        self.db
            .connection()
            .call(move |conn| -> Result<Vec<ScoredMemory>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let hits: Vec<(MemoryId, f64)> = match (vector, index) {
                    (Some(v), Some(index)) => {
                        let filter = NeighborFilter {
                            min_salience: Some(min_salience),
                            exclude: HashSet::new(),
                        };
                        index
                            .nearest(&tx, &v, limit, &filter)?
                            .into_iter()
                            .map(|n| (n.id, 1.0 - f64::from(n.distance)))
                            .collect()
                    }
                    _ => keyword_hits(&tx, &query, limit, min_salience)?
                        .into_iter()
                        .map(|id| (id, KEYWORD_RELEVANCE))
                        .collect(),
                };
                let ids: Vec<MemoryId> = hits.iter().map(|(id, _)| *id).collect();
                record_access(&tx, &ids, &now)?;

                let mut results = Vec::with_capacity(hits.len());
                for (id, relevance) in hits {
                    if let Some(record) = load_record(&tx, id)? {
                        results.push(ScoredMemory { record, relevance });
                    }
                }
                tx.commit()?;
                Ok(results)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Nearest records to `text` without recording access.
    ///
    /// Empty when no embedding or index is available.
    pub async fn similar_to_text(
        &self,
        text: &str,
        k: usize,
        exclude: HashSet<MemoryId>,
    ) -> Result<Vec<ScoredMemory>, StrataError> {
        if !self.vector_search_available() {
            return Ok(Vec::new());
        }
        let Some(vector) = self.embedder.embed(text).await.into_vector() else {
            return Ok(Vec::new());
        };
        self.similar_to_vector(vector, k, exclude).await
    }

    /// Nearest records to the stored embedding of `id`, excluding `id` itself.
    pub async fn similar_to_memory(
        &self,
        id: MemoryId,
        k: usize,
    ) -> Result<Vec<ScoredMemory>, StrataError> {
        let Some(index) = self.index.clone() else {
            return Ok(Vec::new());
        };
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<ScoredMemory>, rusqlite::Error> {
                let Some(vector) = embedding_for(conn, id)? else {
                    return Ok(Vec::new());
                };
                let filter = NeighborFilter {
                    min_salience: None,
                    exclude: HashSet::from([id]),
                };
                scored_neighbors(conn, index.as_ref(), &vector, k, &filter)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn similar_to_vector(
        &self,
        vector: Vec<f32>,
        k: usize,
        exclude: HashSet<MemoryId>,
    ) -> Result<Vec<ScoredMemory>, StrataError> {
        let Some(index) = self.index.clone() else {
            return Ok(Vec::new());
        };
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<ScoredMemory>, rusqlite::Error> {
                let filter = NeighborFilter {
                    min_salience: None,
                    exclude,
                };
                scored_neighbors(conn, index.as_ref(), &vector, k, &filter)
            })
            .await
            .map_err(map_tr_err)
    }

    /// The stored embedding of a record, if any.
    pub async fn embedding_of(&self, id: MemoryId) -> Result<Option<Vec<f32>>, StrataError> {
        self.db
            .connection()
            .call(move |conn| -> Result<Option<Vec<f32>>, rusqlite::Error> {
                embedding_for(conn, id)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Look up one record without recording access.
    pub async fn get(&self, id: MemoryId) -> Result<Option<MemoryRecord>, StrataError> {
        self.db
            .connection()
            .call(move |conn| -> Result<Option<MemoryRecord>, rusqlite::Error> {
                load_record(conn, id)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Newest latest records of one type. Access is recorded.
    pub async fn recent_by_type(
        &self,
        memory_type: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StrataError> {
        let memory_type = memory_type.to_string();
        let now = now_ts();
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<MemoryRecord>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let ids: Vec<MemoryId> = tx
                    .prepare_cached(
                        "SELECT id FROM memories
                         WHERE memory_type = ?1 AND is_latest = 1
                         ORDER BY created_at DESC, id DESC
                         LIMIT ?2",
                    )?
                    .query_map(params![memory_type, limit as i64], |row| {
                        Ok(MemoryId(row.get(0)?))
                    })?
                    .collect::<Result<_, _>>()?;
                record_access(&tx, &ids, &now)?;
                let records = load_records(&tx, &ids)?;
                tx.commit()?;
                Ok(records)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Latest records created at or after `since`, newest first. Access is recorded.
    pub async fn records_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StrataError> {
        let since = format_ts(since);
        let now = now_ts();
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<MemoryRecord>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let ids: Vec<MemoryId> = tx
                    .prepare_cached(
                        "SELECT id FROM memories
                         WHERE created_at >= ?1 AND is_latest = 1
                         ORDER BY created_at DESC, id DESC
                         LIMIT ?2",
                    )?
                    .query_map(params![since, limit as i64], |row| Ok(MemoryId(row.get(0)?)))?
                    .collect::<Result<_, _>>()?;
                record_access(&tx, &ids, &now)?;
                let records = load_records(&tx, &ids)?;
                tx.commit()?;
                Ok(records)
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn set_identity(&self, key: &str, value: &str) -> Result<(), StrataError> {
        kv::set(&self.db, KvTable::Identity, key, value).await
    }

    pub async fn get_identity(&self, key: &str) -> Result<Option<String>, StrataError> {
        kv::get(&self.db, KvTable::Identity, key).await
    }

    pub async fn identity(&self) -> Result<Vec<KvEntry>, StrataError> {
        kv::list(&self.db, KvTable::Identity).await
    }

    pub async fn set_active(&self, key: &str, value: &str) -> Result<(), StrataError> {
        kv::set(&self.db, KvTable::ActiveContext, key, value).await
    }

    pub async fn get_active(&self, key: &str) -> Result<Option<String>, StrataError> {
        kv::get(&self.db, KvTable::ActiveContext, key).await
    }

    pub async fn active(&self) -> Result<Vec<KvEntry>, StrataError> {
        kv::list(&self.db, KvTable::ActiveContext).await
    }

    pub async fn remove_active(&self, key: &str) -> Result<bool, StrataError> {
        kv::delete(&self.db, KvTable::ActiveContext, key).await
    }

    /// Identity pairs as a markdown block, or empty when there are none.
    pub async fn identity_context(&self) -> Result<String, StrataError> {
        let entries = self.identity().await?;
        if entries.is_empty() {
            return Ok(String::new());
        }
        let mut out = String::from("# Identity\n");
        for e in entries {
            out.push_str(&format!("- {}: {}\n", e.key, e.value));
        }
        Ok(out)
    }

    /// Active-context pairs as a markdown block, or empty when there are none.
    pub async fn active_context(&self) -> Result<String, StrataError> {
        let entries = self.active().await?;
        if entries.is_empty() {
            return Ok(String::new());
        }
        let mut out = String::from("# Active Context\n");
        for e in entries {
            out.push_str(&format!("## {}\n{}\n", e.key, e.value));
        }
        Ok(out)
    }

    /// Identity then active context, separated by a blank line.
    pub async fn startup_context(&self) -> Result<String, StrataError> {
        let parts: Vec<String> = [self.identity_context().await?, self.active_context().await?]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        Ok(parts.join("\n\n"))
    }

    pub async fn stats(&self) -> Result<StoreStats, StrataError> {
        let embeddings_available = self.embeddings_available();
        let vector_search_available = self.vector_search_available();
        self.db
            .connection()
            .call(move |conn| -> Result<StoreStats, rusqlite::Error> {
                let count = |sql: &str| conn.query_row(sql, [], |row| row.get::<_, i64>(0));
                let grouped = |sql: &str| -> rusqlite::Result<BTreeMap<String, i64>> {
                    conn.prepare(sql)?
                        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                        .collect()
                };
                Ok(StoreStats {
                    memories: count("SELECT COUNT(*) FROM memories")?,
                    identity_keys: count("SELECT COUNT(*) FROM identity")?,
                    active_keys: count("SELECT COUNT(*) FROM active_context")?,
                    embeddings: count("SELECT COUNT(*) FROM memory_embeddings")?,
                    by_layer: grouped("SELECT layer, COUNT(*) FROM memories GROUP BY layer")?,
                    by_type: grouped(
                        "SELECT memory_type, COUNT(*) FROM memories GROUP BY memory_type",
                    )?,
                    embeddings_available,
                    vector_search_available,
                })
            })
            .await
            .map_err(map_tr_err)
    }

    /// Delete every record, embedding and edge. Identity and active context stay.
    pub async fn clear(&self) -> Result<u64, StrataError> {
        let removed = self
            .db
            .connection()
            .call(|conn| -> Result<u64, rusqlite::Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM memory_edges", [])?;
                tx.execute("DELETE FROM memory_embeddings", [])?;
                let removed = tx.execute("DELETE FROM memories", [])?;
                tx.commit()?;
                Ok(removed as u64)
            })
            .await
            .map_err(map_tr_err)?;
        debug!(removed, "memory store cleared");
        Ok(removed)
    }
}

fn scored_neighbors(
    conn: &rusqlite::Connection,
    index: &dyn VectorIndex,
    vector: &[f32],
    k: usize,
    filter: &NeighborFilter,
) -> rusqlite::Result<Vec<ScoredMemory>> {
    let mut results = Vec::new();
    for n in index.nearest(conn, vector, k, filter)? {
        if let Some(record) = load_record(conn, n.id)? {
            results.push(ScoredMemory {
                record,
                relevance: 1.0 - f64::from(n.distance),
            });
        }
    }
    Ok(results)
}
