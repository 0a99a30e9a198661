// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends.

use async_trait::async_trait;

use crate::error::StrataError;
use crate::traits::adapter::PluginAdapter;

/// Adapter for storage and persistence backends.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Opens the backend and applies pending schema migrations.
    async fn initialize(&self) -> Result<(), StrataError>;

    /// Flushes pending writes and releases the connection.
    async fn close(&self) -> Result<(), StrataError>;
}
