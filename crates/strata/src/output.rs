// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared rendering helpers for command output.

use serde::Serialize;

/// Pretty JSON, or `{}` if serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// A section heading with an underline rule.
pub fn heading(title: &str, color: bool) -> String {
    let title = if color {
        use colored::Colorize;
        title.bold().to_string()
    } else {
        title.to_string()
    };
    format!("  {title}\n  {}", "-".repeat(35))
}

/// Status marker for a line item.
pub fn marker(ok: bool, color: bool) -> String {
    use colored::Colorize;
    match (ok, color) {
        (true, true) => "✓".green().to_string(),
        (false, true) => "✗".red().to_string(),
        (true, false) => "[OK]".to_string(),
        (false, false) => "[--]".to_string(),
    }
}

/// Shorten `text` to `max` characters, appending `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_heading_has_rule() {
        let h = heading("strata stats", false);
        assert!(h.starts_with("  strata stats\n  ---"));
    }

    #[test]
    fn plain_markers() {
        assert_eq!(marker(true, false), "[OK]");
        assert_eq!(marker(false, false), "[--]");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("héllo", 10), "héllo");
        assert_eq!(truncate("héllo world", 5), "héllo...");
    }

    #[test]
    fn json_is_pretty() {
        let out = to_json(&serde_json::json!({"a": 1}));
        assert_eq!(out, "{\n  \"a\": 1\n}");
    }
}
