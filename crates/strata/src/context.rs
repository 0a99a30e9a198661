// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `strata identity` and `strata active`.

use std::fmt::Write;

use clap::Subcommand;
use serde::Serialize;
use strata_core::StrataError;
use strata_memory::MemoryEngine;

use crate::output::{heading, to_json};
use crate::OutputMode;

/// Key/value actions shared by identity and active context.
#[derive(Subcommand, Debug)]
pub enum KvAction {
    /// Set a key.
    Set { key: String, value: Vec<String> },
    /// Print one key.
    Get { key: String },
    /// List every key (the default).
    List,
    /// Remove a key (active context only).
    Remove { key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvScope {
    Identity,
    Active,
}

impl KvScope {
    fn title(self) -> &'static str {
        match self {
            KvScope::Identity => "identity",
            KvScope::Active => "active context",
        }
    }
}

#[derive(Debug, Serialize)]
struct KvResult<'a> {
    key: &'a str,
    value: Option<String>,
}

pub async fn run_kv(
    engine: &MemoryEngine,
    scope: KvScope,
    action: Option<KvAction>,
    mode: OutputMode,
) -> Result<String, StrataError> {
    let store = engine.store();
    match action.unwrap_or(KvAction::List) {
        KvAction::Set { key, value } => {
            let value = value.join(" ");
            match scope {
                KvScope::Identity => engine.set_identity(&key, &value).await?,
                KvScope::Active => engine.set_active(&key, &value).await?,
            }
            if mode.json {
                return Ok(to_json(&KvResult {
                    key: &key,
                    value: Some(value),
                }));
            }
            Ok(format!("{} {key} set", scope.title()))
        }
        KvAction::Get { key } => {
            let value = match scope {
                KvScope::Identity => store.get_identity(&key).await?,
                KvScope::Active => store.get_active(&key).await?,
            };
            if mode.json {
                return Ok(to_json(&KvResult { key: &key, value }));
            }
            value.ok_or_else(|| StrataError::NotFound(format!("{} key {key}", scope.title())))
        }
        KvAction::List => {
            let entries = match scope {
                KvScope::Identity => engine.identity().await?,
                KvScope::Active => engine.active().await?,
            };
            if mode.json {
                return Ok(to_json(&entries));
            }
            if entries.is_empty() {
                return Ok(format!("no {} entries", scope.title()));
            }
            let mut out = heading(scope.title(), mode.color);
            for e in &entries {
                let _ = write!(out, "\n    {}: {}", e.key, e.value);
            }
            Ok(out)
        }
        KvAction::Remove { key } => {
            if scope == KvScope::Identity {
                return Err(StrataError::Config(
                    "identity entries cannot be removed".to_string(),
                ));
            }
            let removed = engine.remove_active(&key).await?;
            if mode.json {
                return Ok(to_json(&serde_json::json!({ "key": key, "removed": removed })));
            }
            if removed {
                Ok(format!("active context {key} removed"))
            } else {
                Err(StrataError::NotFound(format!("active context key {key}")))
            }
        }
    }
}
