// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Strata tests.
//!
//! Provides a deterministic embedding adapter and database helpers so
//! memory tests run without model files.
//!
//! # Components
//!
//! - [`MockEmbedder`] - hashed bag-of-words embeddings with per-text overrides
//! - [`memory_database`] / [`temp_database`] - migrated SQLite databases

pub mod db;
pub mod mock_embedder;

pub use db::{memory_database, temp_database};
pub use mock_embedder::{MockEmbedder, MOCK_DIMENSIONS};
