// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for the key-value tables.

use serde::{Deserialize, Serialize};

/// The two upsert-only key-value namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KvTable {
    /// Stable facts about who the agent is.
    Identity,
    /// What the agent is doing right now.
    ActiveContext,
}

impl KvTable {
    pub(crate) fn table_name(self) -> &'static str {
        match self {
            KvTable::Identity => "identity",
            KvTable::ActiveContext => "active_context",
        }
    }
}

/// One key-value row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}
