// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./strata.toml` > `~/.config/strata/strata.toml`
//! > `/etc/strata/strata.toml`, with environment variable overrides via the
//! `STRATA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::StrataConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/strata/strata.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "strata.toml";

/// Top-level sections that environment variables may address.
const ENV_SECTIONS: &[&str] = &[
    "log",
    "storage",
    "embedding",
    "search",
    "graph",
    "surfacing",
    "consolidation",
];

/// User configuration file under the XDG config directory, if one is known.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("strata").join("strata.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/strata/strata.toml`
/// 3. `~/.config/strata/strata.toml`
/// 4. `./strata.toml`
/// 5. `STRATA_*` environment variables
pub fn load_config() -> Result<StrataConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no environment).
pub fn load_config_from_str(toml_content: &str) -> Result<StrataConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StrataConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<StrataConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StrataConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(StrataConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider mapping `STRATA_<SECTION>_<KEY>` to `section.key`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `STRATA_CONSOLIDATION_PRUNE_MIN_AGE_DAYS` maps to
/// `consolidation.prune_min_age_days`. Variables that do not start with a
/// known section are ignored.
fn env_provider() -> Env {
    Env::prefixed("STRATA_").filter_map(|key| map_env_key(key.as_str()).map(Into::into))
}

/// Map a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> Option<String> {
    ENV_SECTIONS.iter().find_map(|section| {
        key.strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|field| !field.is_empty())
            .map(|field| format!("{section}.{field}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("log_level").as_deref(), Some("log.level"));
        assert_eq!(
            map_env_key("storage_database_path").as_deref(),
            Some("storage.database_path")
        );
        assert_eq!(
            map_env_key("consolidation_prune_min_age_days").as_deref(),
            Some("consolidation.prune_min_age_days")
        );
    }

    #[test]
    fn unknown_env_sections_are_ignored() {
        assert_eq!(map_env_key("config"), None);
        assert_eq!(map_env_key("storage"), None);
        assert_eq!(map_env_key("storage_"), None);
        assert_eq!(map_env_key("storagex_path"), None);
    }

    #[test]
    fn env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
[storage]
database_path = "/from/file.db"

[graph]
max_chain_depth = 4
"#,
            )?;
            jail.set_env("STRATA_STORAGE_DATABASE_PATH", "/from/env.db");
            jail.set_env("STRATA_SURFACING_MIN_CONFIDENCE", "0.5");

            let config = load_config_from_path(Path::new("custom.toml"))?;
            assert_eq!(config.storage.database_path, "/from/env.db");
            assert_eq!(config.graph.max_chain_depth, 4);
            assert!((config.surfacing.min_confidence - 0.5).abs() < f64::EPSILON);
            Ok(())
        });
    }
}
