// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Strata configuration system.

use std::io::Write;

use strata_config::diagnostic::ConfigError;
use strata_config::model::Pooling;
use strata_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[log]
level = "debug"

[storage]
database_path = "/tmp/strata-test.db"
wal_mode = false

[embedding]
enabled = false
model_dir = "/opt/models/minilm"
pooling = "mean"
max_tokens = 256

[search]
default_limit = 8
detection_candidates = 3

[graph]
max_chain_depth = 6
preview_chars = 80

[surfacing]
default_limit = 4
min_confidence = 0.5
startup_limit = 3

[consolidation]
prune_min_age_days = 14
prune_max_salience = 0.3
merge_similarity = 0.9
merge_neighbors = 4
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/strata-test.db");
    assert!(!config.storage.wal_mode);
    assert!(!config.embedding.enabled);
    assert_eq!(config.embedding.pooling, Pooling::Mean);
    assert_eq!(config.embedding.max_tokens, 256);
    assert_eq!(config.search.detection_candidates, 3);
    assert_eq!(config.graph.max_chain_depth, 6);
    assert_eq!(config.graph.preview_chars, 80);
    assert_eq!(config.surfacing.startup_limit, 3);
    assert_eq!(config.consolidation.prune_min_age_days, 14);
    assert_eq!(config.consolidation.merge_neighbors, 4);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("empty config is valid");
    assert_eq!(config.search.default_limit, 5);
    assert_eq!(config.surfacing.default_limit, 5);
    assert!(config.embedding.enabled);
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[graph]
max_chain_dept = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown key");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "max_chain_dept");
            assert_eq!(suggestion.as_deref(), Some("max_chain_depth"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telemetry]\nenabled = true\n")
        .expect_err("unknown section should fail");
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[search]\ndefault_limit = \"many\"\n")
        .expect_err("string for integer should fail");
    assert!(
        matches!(&errors[0], ConfigError::InvalidType { key, .. } if key.contains("default_limit")),
        "got: {errors:?}"
    );
}

#[test]
fn unknown_pooling_is_rejected() {
    let result = load_config_from_str("[embedding]\npooling = \"max\"\n");
    assert!(result.is_err());
}

#[test]
fn out_of_range_threshold_fails_validation() {
    let errors = load_and_validate_str("[consolidation]\nmerge_similarity = 2.0\n")
        .expect_err("threshold above 1 should fail");
    assert!(matches!(
        &errors[0],
        ConfigError::OutOfRange { key, .. } if key == "consolidation.merge_similarity"
    ));
}

#[test]
#[serial_test::serial]
fn loads_explicit_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[storage]\ndatabase_path = \"/var/lib/strata/test.db\"").expect("write");

    let config = load_and_validate_path(file.path()).expect("file config is valid");
    assert_eq!(config.storage.database_path, "/var/lib/strata/test.db");
}

#[test]
#[serial_test::serial]
fn explicit_file_unknown_key_is_suggested() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[storage]\ndatabse_path = \"x.db\"").expect("write");

    let errors = load_and_validate_path(file.path()).expect_err("should fail");
    match &errors[0] {
        ConfigError::UnknownKey { suggestion, .. } => {
            assert_eq!(suggestion.as_deref(), Some("database_path"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}
