// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic layer routing and salience scoring.
//!
//! Pure functions over the content text and an optional declared type.
//! Nothing here touches storage.

use regex::Regex;
use serde::Serialize;

use crate::patterns::compile_all;
use crate::types::Layer;

const IDENTITY_PATTERNS: &[&str] = &[
    r"\bmy name\b",
    r"\bi am\b",
    r"\bwho i am\b",
    r"\bborn\b.*\d{4}",
    r"\bcreated\b.*\d{4}",
    r"\bhuman[:\s]",
    r"\bowner[:\s]",
    r"\bbill\b.*(?:telegram|github|twitter|prefers|likes|wants)",
    r"\bidentity\b",
    r"\bpersonality\b",
    r"\bcore (?:values?|traits?|beliefs?)\b",
    r"\bemancipat",
    r"\bsoul\.md\b",
    r"\bi (?:prefer|believe|value|always)\b",
    r"\bmy (?:human|creator|partner)\b",
];

const ACTIVE_PATTERNS: &[&str] = &[
    r"\bcurrent(?:ly)?\b",
    r"\bworking on\b",
    r"\bright now\b",
    r"\btoday\b",
    r"\bthis (?:week|session|sprint)\b",
    r"\bnext step\b",
    r"\btodo\b",
    r"\bin progress\b",
    r"\bactive\b.*project",
    r"\bblocked\b",
    r"\bwaiting (?:on|for)\b",
    r"\bjust (?:shipped|pushed|deployed|built|created)\b",
    r"\bnew directive\b",
    r"\bbill (?:said|asked|wants|told)\b",
];

const HIGH_SALIENCE_KEYWORDS: &[&str] = &[
    "decision",
    "decided",
    "important",
    "critical",
    "never",
    "always",
    "lesson",
    "learned",
    "mistake",
    "breakthrough",
    "preference",
    "correction",
    "emancipat",
    "directive",
    "rule",
    "principle",
];

const TYPE_BOOSTS: &[(&str, f64)] = &[
    ("decision", 0.2),
    ("preference", 0.15),
    ("identity", 0.25),
    ("correction", 0.2),
    ("insight", 0.15),
    ("error", 0.1),
];

/// Pattern tables and weights used by [`LayerClassifier`].
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    pub identity: Vec<Regex>,
    pub active: Vec<Regex>,
    /// Matched as lower-cased substrings.
    pub salience_keywords: Vec<String>,
    pub type_boosts: Vec<(String, f64)>,
    pub keyword_boost: f64,
    pub default_salience: f64,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            identity: compile_all(IDENTITY_PATTERNS),
            active: compile_all(ACTIVE_PATTERNS),
            salience_keywords: HIGH_SALIENCE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            type_boosts: TYPE_BOOSTS.iter().map(|(t, b)| (t.to_string(), *b)).collect(),
            keyword_boost: 0.1,
            default_salience: 0.5,
        }
    }
}

/// Layer and salience for one piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub layer: Layer,
    pub salience: f64,
}

#[derive(Debug, Clone, Default)]
pub struct LayerClassifier {
    rules: ClassifierRules,
}

impl LayerClassifier {
    pub fn new(rules: ClassifierRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ClassifierRules {
        &self.rules
    }

    /// Layer and salience in one call. `base_salience` defaults to 0.5.
    pub fn classify(
        &self,
        content: &str,
        declared_type: Option<&str>,
        base_salience: Option<f64>,
    ) -> Classification {
        Classification {
            layer: self.layer(content, declared_type),
            salience: self.salience(content, declared_type, base_salience),
        }
    }

    pub fn layer(&self, content: &str, declared_type: Option<&str>) -> Layer {
        let lower = content.to_lowercase();
        let mut identity = self.rules.identity.iter().filter(|re| re.is_match(&lower)).count();
        let mut active = self.rules.active.iter().filter(|re| re.is_match(&lower)).count();

        match declared_type {
            Some("identity" | "core" | "self") => identity += 3,
            Some("task" | "project" | "active" | "current") => active += 3,
            Some("preference") => identity += 1,
            Some("decision") => active += 1,
            _ => {}
        }

        if identity >= 2 {
            Layer::Identity
        } else if active >= 2 {
            Layer::Active
        } else if identity == 1 && active == 0 {
            Layer::Identity
        } else if active == 1 && identity == 0 {
            Layer::Active
        } else {
            Layer::Archive
        }
    }

    /// Importance in [0, 1].
    pub fn salience(
        &self,
        content: &str,
        declared_type: Option<&str>,
        base_salience: Option<f64>,
    ) -> f64 {
        let lower = content.to_lowercase();
        let mut salience = base_salience.unwrap_or(self.rules.default_salience);

        let keywords = self
            .rules
            .salience_keywords
            .iter()
            .filter(|kw| lower.contains(kw.as_str()))
            .count();
        salience += self.rules.keyword_boost * keywords as f64;

        if let Some(declared) = declared_type
            && let Some((_, boost)) = self.rules.type_boosts.iter().find(|(t, _)| t == declared)
        {
            salience += boost;
        }

        let words = content.split_whitespace().count();
        if words > 30 {
            salience += 0.05;
        }
        if words > 60 {
            salience += 0.05;
        }

        if salience.is_nan() {
            return self.rules.default_salience;
        }
        salience.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classifier() -> LayerClassifier {
        LayerClassifier::default()
    }

    #[test]
    fn built_in_patterns_all_compile() {
        let rules = ClassifierRules::default();
        assert_eq!(rules.identity.len(), IDENTITY_PATTERNS.len());
        assert_eq!(rules.active.len(), ACTIVE_PATTERNS.len());
    }

    #[test]
    fn two_identity_signals_route_to_identity() {
        let c = classifier();
        assert_eq!(c.layer("My name is Strata and I am an agent", None), Layer::Identity);
    }

    #[test]
    fn two_active_signals_route_to_active() {
        let c = classifier();
        assert_eq!(
            c.layer("Currently working on the migration", None),
            Layer::Active
        );
    }

    #[test]
    fn single_signal_wins_only_when_uncontested() {
        let c = classifier();
        assert_eq!(c.layer("I prefer tabs", None), Layer::Identity);
        assert_eq!(c.layer("The build is blocked", None), Layer::Active);
        assert_eq!(c.layer("I prefer tabs but the build is blocked", None), Layer::Archive);
    }

    #[test]
    fn no_signal_routes_to_archive() {
        assert_eq!(classifier().layer("Paris is in France", None), Layer::Archive);
    }

    #[test]
    fn declared_type_bonuses() {
        let c = classifier();
        assert_eq!(c.layer("Paris is in France", Some("core")), Layer::Identity);
        assert_eq!(c.layer("Paris is in France", Some("task")), Layer::Active);
        assert_eq!(c.layer("Paris is in France", Some("preference")), Layer::Identity);
        assert_eq!(c.layer("Paris is in France", Some("decision")), Layer::Active);
        assert_eq!(c.layer("Paris is in France", Some("fact")), Layer::Archive);
    }

    #[test]
    fn identity_score_beats_active_at_threshold() {
        // identity 2 (type bonus + "i am"), active 2 ("today" + "currently")
        let c = classifier();
        assert_eq!(
            c.layer("i am currently busy today", Some("preference")),
            Layer::Identity
        );
    }

    #[test]
    fn salience_keyword_and_type_boosts() {
        let c = classifier();
        let plain = c.salience("Paris is in France", None, None);
        assert!((plain - 0.5).abs() < 1e-9);

        let s = c.salience("Important decision: never deploy on Friday", Some("decision"), None);
        // important, decision, never => +0.3, decision type => +0.2
        assert!((s - 1.0).abs() < 1e-9);

        let s = c.salience("a lesson", Some("insight"), Some(0.2));
        assert!((s - 0.45).abs() < 1e-9);
    }

    #[test]
    fn salience_length_boosts() {
        let c = classifier();
        let long = vec!["word"; 31].join(" ");
        assert!((c.salience(&long, None, None) - 0.55).abs() < 1e-9);
        let longer = vec!["word"; 61].join(" ");
        assert!((c.salience(&longer, None, None) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn classify_combines_layer_and_salience() {
        let out = classifier().classify("I decided to use Rust today", Some("decision"), None);
        assert_eq!(out.layer, Layer::Active);
        assert!(out.salience > 0.5);
    }

    proptest! {
        #[test]
        fn salience_always_in_unit_interval(
            content in ".{0,400}",
            base in -5.0f64..5.0,
            declared in prop::option::of(prop::sample::select(vec![
                "decision", "preference", "identity", "correction", "insight", "error", "fact",
            ])),
        ) {
            let s = classifier().salience(&content, declared, Some(base));
            prop_assert!((0.0..=1.0).contains(&s));
        }
    }
}
