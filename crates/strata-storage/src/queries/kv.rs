// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and active-context key-value operations.
//!
//! Last write wins. Entries are not versioned and take no part in the graph.

use rusqlite::{params, OptionalExtension};
use strata_core::StrataError;

use crate::database::{map_tr_err, Database};
use crate::models::{KvEntry, KvTable};
use crate::timestamp::now_ts;

/// Insert or overwrite `key` in `table`.
pub async fn set(db: &Database, table: KvTable, key: &str, value: &str) -> Result<(), StrataError> {
    let sql = format!(
        "INSERT INTO {} (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        table.table_name()
    );
    let key = key.to_string();
    let value = value.to_string();
    let now = now_ts();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(&sql, params![key, value, now])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up one key.
pub async fn get(db: &Database, table: KvTable, key: &str) -> Result<Option<String>, StrataError> {
    let sql = format!("SELECT value FROM {} WHERE key = ?1", table.table_name());
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            conn.query_row(&sql, params![key], |row| row.get(0))
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All entries in key order.
pub async fn list(db: &Database, table: KvTable) -> Result<Vec<KvEntry>, StrataError> {
    let sql = format!(
        "SELECT key, value, updated_at FROM {} ORDER BY key",
        table.table_name()
    );
    db.connection()
        .call(move |conn| -> Result<Vec<KvEntry>, rusqlite::Error> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(KvEntry {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Remove one key. Returns whether it existed.
pub async fn delete(db: &Database, table: KvTable, key: &str) -> Result<bool, StrataError> {
    let sql = format!("DELETE FROM {} WHERE key = ?1", table.table_name());
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            Ok(conn.execute(&sql, params![key])? > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of entries.
pub async fn count(db: &Database, table: KvTable) -> Result<i64, StrataError> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.table_name());
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(&sql, [], |row| row.get(0))
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get() {
        let db = Database::open_in_memory().await.unwrap();
        set(&db, KvTable::Identity, "name", "Strata").await.unwrap();
        assert_eq!(
            get(&db, KvTable::Identity, "name").await.unwrap().as_deref(),
            Some("Strata")
        );
        assert_eq!(get(&db, KvTable::Identity, "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn last_write_wins() {
        let db = Database::open_in_memory().await.unwrap();
        set(&db, KvTable::ActiveContext, "current_task", "draft").await.unwrap();
        set(&db, KvTable::ActiveContext, "current_task", "review").await.unwrap();

        let entries = list(&db, KvTable::ActiveContext).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, "review");
    }

    #[tokio::test]
    async fn tables_are_independent() {
        let db = Database::open_in_memory().await.unwrap();
        set(&db, KvTable::Identity, "k", "identity").await.unwrap();
        set(&db, KvTable::ActiveContext, "k", "active").await.unwrap();

        assert_eq!(
            get(&db, KvTable::Identity, "k").await.unwrap().as_deref(),
            Some("identity")
        );
        assert_eq!(count(&db, KvTable::ActiveContext).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_is_key_ordered_and_delete_reports_presence() {
        let db = Database::open_in_memory().await.unwrap();
        set(&db, KvTable::Identity, "b", "2").await.unwrap();
        set(&db, KvTable::Identity, "a", "1").await.unwrap();

        let keys: Vec<String> = list(&db, KvTable::Identity)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["a", "b"]);

        assert!(delete(&db, KvTable::Identity, "a").await.unwrap());
        assert!(!delete(&db, KvTable::Identity, "a").await.unwrap());
    }
}
