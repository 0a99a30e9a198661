// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::StrataConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &StrataConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.log.level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.embedding.enabled && config.embedding.model_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "embedding.model_dir must not be empty when embedding is enabled"
                .to_string(),
        });
    }

    check_positive(&mut errors, "embedding.max_tokens", config.embedding.max_tokens);
    check_positive(&mut errors, "search.default_limit", config.search.default_limit);
    check_positive(
        &mut errors,
        "search.detection_candidates",
        config.search.detection_candidates,
    );
    check_positive(&mut errors, "graph.max_chain_depth", config.graph.max_chain_depth);
    check_positive(&mut errors, "surfacing.default_limit", config.surfacing.default_limit);
    check_positive(&mut errors, "surfacing.startup_limit", config.surfacing.startup_limit);
    check_positive(
        &mut errors,
        "consolidation.merge_neighbors",
        config.consolidation.merge_neighbors,
    );

    check_unit_interval(
        &mut errors,
        "surfacing.min_confidence",
        config.surfacing.min_confidence,
    );
    check_unit_interval(
        &mut errors,
        "consolidation.prune_max_salience",
        config.consolidation.prune_max_salience,
    );
    check_unit_interval(
        &mut errors,
        "consolidation.merge_similarity",
        config.consolidation.merge_similarity,
    );

    if config.consolidation.prune_min_age_days < 0 {
        errors.push(ConfigError::OutOfRange {
            key: "consolidation.prune_min_age_days".to_string(),
            message: format!(
                "must be non-negative, got {}",
                config.consolidation.prune_min_age_days
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_positive(errors: &mut Vec<ConfigError>, key: &str, value: usize) {
    if value == 0 {
        errors.push(ConfigError::OutOfRange {
            key: key.to_string(),
            message: "must be at least 1".to_string(),
        });
    }
}

fn check_unit_interval(errors: &mut Vec<ConfigError>, key: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigError::OutOfRange {
            key: key.to_string(),
            message: format!("must be within [0, 1], got {value}"),
        });
    }
}
