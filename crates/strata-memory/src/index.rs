// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nearest-neighbour lookup over stored embeddings.
//!
//! The index runs on the database thread with a borrowed connection so a
//! lookup can share a transaction with the statements around it.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::types::{blob_to_vec, cosine_similarity, MemoryId};

/// One neighbour. `distance` is cosine distance (`1 - cosine similarity`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: MemoryId,
    pub distance: f32,
}

/// Restrictions applied before ranking.
#[derive(Debug, Clone, Default)]
pub struct NeighborFilter {
    pub min_salience: Option<f64>,
    pub exclude: HashSet<MemoryId>,
}

/// k-nearest-neighbour search keyed by record id.
///
/// Implementations must order by ascending distance, then newest
/// `created_at`, then highest id.
pub trait VectorIndex: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn nearest(
        &self,
        conn: &rusqlite::Connection,
        query: &[f32],
        k: usize,
        filter: &NeighborFilter,
    ) -> rusqlite::Result<Vec<Neighbor>>;
}

/// Exact cosine scan over `memory_embeddings`.
///
/// Vectors whose dimension differs from the query are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactCosineIndex;

impl VectorIndex for ExactCosineIndex {
    fn name(&self) -> &'static str {
        "exact-cosine"
    }

    fn nearest(
        &self,
        conn: &rusqlite::Connection,
        query: &[f32],
        k: usize,
        filter: &NeighborFilter,
    ) -> rusqlite::Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare_cached(
            "SELECT e.memory_id, e.vector, m.created_at, m.salience
             FROM memory_embeddings e JOIN memories m ON m.id = e.memory_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                MemoryId(row.get(0)?),
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        let mut scored: Vec<(Neighbor, String)> = Vec::new();
        for row in rows {
            let (id, blob, created_at, salience) = row?;
            if filter.exclude.contains(&id) {
                continue;
            }
            if let Some(min) = filter.min_salience
                && salience < min
            {
                continue;
            }
            let Some(sim) = cosine_similarity(query, &blob_to_vec(&blob)) else {
                continue;
            };
            scored.push((
                Neighbor {
                    id,
                    distance: 1.0 - sim,
                },
                created_at,
            ));
        }

        scored.sort_by(|(a, a_ts), (b, b_ts)| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b_ts.cmp(a_ts))
                .then_with(|| b.id.cmp(&a.id))
        });
        scored.truncate(k);
        Ok(scored.into_iter().map(|(n, _)| n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::vec_to_blob;
    use rusqlite::params;

    fn conn_with(rows: &[(i64, &str, f64, Vec<f32>)]) -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE memories (id INTEGER PRIMARY KEY, created_at TEXT, salience REAL);
             CREATE TABLE memory_embeddings (memory_id INTEGER PRIMARY KEY, vector BLOB, dimensions INTEGER);",
        )
        .unwrap();
        for (id, ts, salience, v) in rows {
            conn.execute(
                "INSERT INTO memories (id, created_at, salience) VALUES (?1, ?2, ?3)",
                params![id, ts, salience],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO memory_embeddings VALUES (?1, ?2, ?3)",
                params![id, vec_to_blob(v), v.len() as i64],
            )
            .unwrap();
        }
        conn
    }

    #[test]
    fn orders_by_distance() {
        let conn = conn_with(&[
            (1, "2026-01-01", 0.5, vec![0.0, 1.0]),
            (2, "2026-01-01", 0.5, vec![1.0, 0.0]),
            (3, "2026-01-01", 0.5, vec![0.8, 0.6]),
        ]);
        let hits = ExactCosineIndex
            .nearest(&conn, &[1.0, 0.0], 3, &NeighborFilter::default())
            .unwrap();
        let ids: Vec<i64> = hits.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(hits[0].distance.abs() < 1e-6);
        assert!((hits[1].distance - 0.2).abs() < 1e-6);
    }

    #[test]
    fn ties_prefer_newest_then_highest_id() {
        let conn = conn_with(&[
            (1, "2026-01-02", 0.5, vec![1.0, 0.0]),
            (2, "2026-01-01", 0.5, vec![1.0, 0.0]),
            (3, "2026-01-02", 0.5, vec![1.0, 0.0]),
        ]);
        let hits = ExactCosineIndex
            .nearest(&conn, &[1.0, 0.0], 3, &NeighborFilter::default())
            .unwrap();
        let ids: Vec<i64> = hits.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn filter_excludes_and_thresholds() {
        let conn = conn_with(&[
            (1, "2026-01-01", 0.9, vec![1.0, 0.0]),
            (2, "2026-01-01", 0.1, vec![1.0, 0.0]),
            (3, "2026-01-01", 0.9, vec![1.0, 0.0]),
            (4, "2026-01-01", 0.9, vec![1.0, 0.0, 0.0]),
        ]);
        let filter = NeighborFilter {
            min_salience: Some(0.5),
            exclude: HashSet::from([MemoryId(3)]),
        };
        let hits = ExactCosineIndex
            .nearest(&conn, &[1.0, 0.0], 10, &filter)
            .unwrap();
        let ids: Vec<i64> = hits.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn k_limits_results() {
        let conn = conn_with(&[
            (1, "2026-01-01", 0.5, vec![1.0, 0.0]),
            (2, "2026-01-01", 0.5, vec![0.9, 0.1]),
        ]);
        let hits = ExactCosineIndex
            .nearest(&conn, &[1.0, 0.0], 1, &NeighborFilter::default())
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(ExactCosineIndex
            .nearest(&conn, &[1.0, 0.0], 0, &NeighborFilter::default())
            .unwrap()
            .is_empty());
    }
}
