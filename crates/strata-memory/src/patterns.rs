// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared regex helpers for the rule tables.

use regex::Regex;
use tracing::warn;

/// Compile a pattern table, skipping (and logging) any entry that fails.
pub(crate) fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %p, error = %e, "skipping invalid pattern");
                None
            }
        })
        .collect()
}

pub(crate) fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

/// First capture group of every match of every pattern, in pattern order.
pub(crate) fn captures<'t>(patterns: &[Regex], text: &'t str) -> Vec<&'t str> {
    patterns
        .iter()
        .flat_map(|re| re.captures_iter(text).filter_map(|c| c.get(1)))
        .map(|m| m.as_str())
        .collect()
}
