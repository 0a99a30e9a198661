// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Strata memory engine.
//!
//! WAL-mode SQLite with embedded refinery migrations and a single-writer
//! concurrency model via `tokio-rusqlite`. The memory graph tables are
//! queried by `strata-memory`; this crate owns the schema, the connection,
//! and the identity / active-context key-value tables.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod timestamp;

pub use adapter::SqliteStorage;
pub use database::{map_tr_err, Database};
pub use models::{KvEntry, KvTable};
