// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary and applied
//! once, in version order, when the database is opened.

use strata_core::StrataError;
use tracing::info;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply all pending migrations.
///
/// Refinery records applied versions in `refinery_schema_history`, so this is
/// a no-op on an up-to-date database.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), StrataError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(StrataError::storage)?;
    for migration in report.applied_migrations() {
        info!(version = migration.version(), name = migration.name(), "applied migration");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &rusqlite::Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n == 1)
        .unwrap_or(false)
    }

    #[test]
    fn migrations_create_memory_schema() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();

        for table in [
            "memories",
            "memory_embeddings",
            "identity",
            "active_context",
            "memory_edges",
        ] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM refinery_schema_history", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(versions, 2);
    }

    #[test]
    fn graph_migration_adds_version_columns() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO memories (content, created_at, updated_at) VALUES ('x', 't', 't')",
            [],
        )
        .unwrap();
        let (is_latest, expires_at): (i64, Option<String>) = conn
            .query_row(
                "SELECT is_latest, expires_at FROM memories WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(is_latest, 1);
        assert!(expires_at.is_none());
    }

    #[test]
    fn edges_reject_self_loops() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO memories (content, created_at, updated_at) VALUES ('x', 't', 't')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO memory_edges (source_id, target_id, relation, created_at)
             VALUES (1, 1, 'updates', 't')",
            [],
        );
        assert!(result.is_err());
    }
}
