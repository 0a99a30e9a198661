// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database fixtures.

use strata_core::StrataError;
use strata_storage::Database;
use tempfile::TempDir;

/// A migrated in-memory database.
pub async fn memory_database() -> Result<Database, StrataError> {
    Database::open_in_memory().await
}

/// A migrated on-disk database in a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the database is used.
pub async fn temp_database() -> Result<(TempDir, Database), StrataError> {
    let dir = tempfile::tempdir()
        .map_err(|e| StrataError::Internal(format!("failed to create temp dir: {e}")))?;
    let path = dir.path().join("strata.db");
    let db = Database::open(&path.to_string_lossy(), true).await?;
    Ok((dir, db))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn temp_databases_are_independent() {
        let (dir_a, _a) = temp_database().await.unwrap();
        let (dir_b, _b) = temp_database().await.unwrap();
        assert_ne!(dir_a.path(), dir_b.path());
        assert!(dir_a.path().join("strata.db").exists());
    }

    #[tokio::test]
    async fn memory_database_is_migrated() {
        let db = memory_database().await.unwrap();
        let count: i64 = db
            .connection()
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM memory_edges", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
