// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Strata memory engine.
//!
//! Foundational trait definitions, the error type, and common types used
//! throughout the workspace.

pub mod error;
pub mod traits;
pub mod types;

pub use error::StrataError;
pub use types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus, MemoryId};

pub use traits::{EmbeddingAdapter, PluginAdapter, StorageAdapter};
