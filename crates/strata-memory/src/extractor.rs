// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pattern-based extraction of memory-worthy statements from free text.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;

use crate::patterns::compile_all;

const DECISION_PATTERNS: &[&str] = &[
    r"(?i)we (?:decided|agreed|chose|will|should|going to|need to)\b",
    r"(?i)let'?s\b",
    r"(?i)the plan is\b",
    r"(?i)(?:i|we) (?:want|need) to\b",
    r"(?i)pivot(?:ed|ing)?\b",
];

const PREFERENCE_PATTERNS: &[&str] = &[
    r"(?i)(?:i|you|bill|we) (?:prefer|like|love|want|don'?t like|hate)\b",
    r"(?i)(?:better|best|favorite|rather)\b",
];

const INSIGHT_PATTERNS: &[&str] = &[
    r"(?i)(?:the key|important|insight|learned|realized|discovered)\b",
    r"(?i)turns out\b",
    r"(?i)the (?:problem|issue|challenge|opportunity) is\b",
];

const GOAL_PATTERNS: &[&str] = &[
    r"(?i)(?:goal|objective|target|aim) is\b",
    r"(?i)we'?re (?:building|creating|making|trying to)\b",
    r"(?i)the vision is\b",
];

/// One statement worth remembering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedMemory {
    pub content: String,
    pub memory_type: String,
    pub salience: f64,
    /// How sure the extractor is that the statement is worth keeping.
    pub confidence: f64,
}

/// A labelled pattern group. Groups are tried in order; the first match
/// labels the chunk.
#[derive(Debug, Clone)]
pub struct ExtractionKind {
    pub memory_type: String,
    pub patterns: Vec<Regex>,
    pub salience: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct ExtractionRules {
    pub kinds: Vec<ExtractionKind>,
    /// Applied in order; each splits the pieces the previous one produced.
    pub separators: Vec<Regex>,
    pub min_chunk_chars: usize,
    pub dedup_prefix_chars: usize,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        let kind = |memory_type: &str, patterns: &[&str], salience, confidence| ExtractionKind {
            memory_type: memory_type.to_string(),
            patterns: compile_all(patterns),
            salience,
            confidence,
        };
        Self {
            kinds: vec![
                kind("decision", DECISION_PATTERNS, 0.8, 0.7),
                kind("preference", PREFERENCE_PATTERNS, 0.7, 0.6),
                kind("insight", INSIGHT_PATTERNS, 0.75, 0.6),
                kind("goal", GOAL_PATTERNS, 0.85, 0.7),
            ],
            separators: compile_all(&[r"[\n.!?]+", r"\s*[—–]\s*|\s+-\s+"]),
            min_chunk_chars: 20,
            dedup_prefix_chars: 50,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicExtractor {
    rules: ExtractionRules,
}

impl HeuristicExtractor {
    pub fn new(rules: ExtractionRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ExtractionRules {
        &self.rules
    }

    /// Labelled statements from `text` with confidence at least `min_confidence`.
    pub fn extract(&self, text: &str, min_confidence: f64) -> Vec<ExtractedMemory> {
        let mut seen = HashSet::new();
        self.chunks(text)
            .into_iter()
            .filter(|chunk| chunk.chars().count() >= self.rules.min_chunk_chars)
            .filter_map(|chunk| {
                let kind = self
                    .rules
                    .kinds
                    .iter()
                    .find(|k| k.patterns.iter().any(|re| re.is_match(chunk)))?;
                Some(ExtractedMemory {
                    content: chunk.to_string(),
                    memory_type: kind.memory_type.clone(),
                    salience: kind.salience,
                    confidence: kind.confidence,
                })
            })
            .filter(|m| m.confidence >= min_confidence)
            .filter(|m| {
                let key: String = m
                    .content
                    .to_lowercase()
                    .chars()
                    .take(self.rules.dedup_prefix_chars)
                    .collect();
                seen.insert(key)
            })
            .collect()
    }

    fn chunks<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut pieces = vec![text];
        for separator in &self.rules.separators {
            pieces = pieces.into_iter().flat_map(|p| separator.split(p)).collect();
        }
        pieces.into_iter().map(str::trim).filter(|c| !c.is_empty()).collect()
    }
}
