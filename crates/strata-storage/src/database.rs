// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use std::path::Path;

use strata_core::StrataError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Convert a tokio-rusqlite error into [`StrataError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> StrataError {
    StrataError::storage(e)
}

/// The single writer for one SQLite database.
///
/// Cloning is cheap and every clone shares the same background thread.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database file at `path`, apply PRAGMAs
    /// and run pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, StrataError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(StrataError::storage)?;
        }

        let conn = Connection::open(path).await.map_err(StrataError::storage)?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the full schema applied.
    pub async fn open_in_memory() -> Result<Self, StrataError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(StrataError::storage)?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), StrataError> {
        self.conn
            .call(
                move |conn| -> Result<Result<(), StrataError>, rusqlite::Error> {
                    if wal_mode {
                        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                    }
                    conn.execute_batch(
                        "PRAGMA foreign_keys = ON;
                         PRAGMA busy_timeout = 5000;
                         PRAGMA synchronous = NORMAL;",
                    )?;
                    Ok(migrations::run_migrations(conn))
                },
            )
            .await
            .map_err(map_tr_err)?
    }

    /// The shared async connection handle.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Truncate the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), StrataError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)
    }
}
