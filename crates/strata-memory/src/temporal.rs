// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-phrase tables: expiry for time-bound content and look-back windows
//! for surfacing.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::patterns::compile_all;

/// How long content stays current once an expiry phrase matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirySpan {
    Fixed(Duration),
    /// Capture group 2 holds a count of minutes.
    Minutes,
    Hours,
    Days,
}

#[derive(Debug, Clone)]
pub struct ExpiryRule {
    pub pattern: Regex,
    pub span: ExpirySpan,
}

/// Ordered expiry rules; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct ExpiryRules {
    pub rules: Vec<ExpiryRule>,
}

impl Default for ExpiryRules {
    fn default() -> Self {
        let table: [(&str, ExpirySpan); 11] = [
            (r"\b(tomorrow|tmrw)\b", ExpirySpan::Fixed(Duration::days(2))),
            (r"\b(tonight)\b", ExpirySpan::Fixed(Duration::hours(12))),
            (r"\b(today)\b", ExpirySpan::Fixed(Duration::days(1))),
            (r"\b(this week)\b", ExpirySpan::Fixed(Duration::weeks(1))),
            (r"\b(this month)\b", ExpirySpan::Fixed(Duration::days(31))),
            (r"\b(next week)\b", ExpirySpan::Fixed(Duration::weeks(2))),
            (r"\b(next month)\b", ExpirySpan::Fixed(Duration::days(62))),
            (r"\b(in (\d+) minutes?)\b", ExpirySpan::Minutes),
            (r"\b(in (\d+) hours?)\b", ExpirySpan::Hours),
            (r"\b(in (\d+) days?)\b", ExpirySpan::Days),
            (
                r"\b(meeting|call|appointment|interview) (at|@) \d",
                ExpirySpan::Fixed(Duration::days(1)),
            ),
        ];
        let rules = table
            .into_iter()
            .filter_map(|(pattern, span)| {
                compile_all(&[pattern])
                    .pop()
                    .map(|pattern| ExpiryRule { pattern, span })
            })
            .collect();
        Self { rules }
    }
}

impl ExpiryRules {
    /// Lifetime implied by the first matching phrase, if any.
    ///
    /// A counted phrase whose number does not fit a duration is skipped and
    /// matching continues with the next rule.
    pub fn detect(&self, content: &str) -> Option<Duration> {
        let lower = content.to_lowercase();
        self.rules.iter().find_map(|rule| {
            let caps = rule.pattern.captures(&lower)?;
            match rule.span {
                ExpirySpan::Fixed(d) => Some(d),
                counted => {
                    let n: i64 = caps.get(2)?.as_str().parse().ok()?;
                    match counted {
                        ExpirySpan::Minutes => Duration::try_minutes(n),
                        ExpirySpan::Hours => Duration::try_hours(n),
                        _ => Duration::try_days(n),
                    }
                }
            }
        })
    }

    /// Absolute expiry relative to `now`.
    pub fn expires_at(&self, content: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.detect(content)
            .and_then(|d| now.checked_add_signed(d))
    }
}

/// A look-back phrase recognised in surfacing context.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalCue {
    pub phrase: String,
    pub window: Duration,
    pub description: String,
}

/// Ordered look-back phrases; the first phrase contained in the context wins.
#[derive(Debug, Clone)]
pub struct TemporalCues {
    pub cues: Vec<TemporalCue>,
}

impl Default for TemporalCues {
    fn default() -> Self {
        let table = [
            ("yesterday", Duration::days(1), "yesterday"),
            ("last week", Duration::days(7), "past week"),
            ("last month", Duration::days(30), "past month"),
            ("recently", Duration::days(3), "last 3 days"),
            ("today", Duration::zero(), "today"),
            ("earlier", Duration::hours(6), "past 6 hours"),
            ("an hour ago", Duration::hours(1), "past hour"),
            ("a few hours", Duration::hours(3), "past 3 hours"),
        ];
        Self {
            cues: table
                .into_iter()
                .map(|(phrase, window, description)| TemporalCue {
                    phrase: phrase.to_string(),
                    window,
                    description: description.to_string(),
                })
                .collect(),
        }
    }
}

impl TemporalCues {
    pub fn find(&self, context: &str) -> Option<&TemporalCue> {
        let lower = context.to_lowercase();
        self.cues.iter().find(|cue| lower.contains(&cue.phrase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn built_in_expiry_rules_all_compile() {
        assert_eq!(ExpiryRules::default().rules.len(), 11);
    }

    #[test]
    fn fixed_phrases() {
        let rules = ExpiryRules::default();
        assert_eq!(rules.detect("Dentist tomorrow at 9"), Some(Duration::days(2)));
        assert_eq!(rules.detect("call mom tmrw"), Some(Duration::days(2)));
        assert_eq!(rules.detect("Pizza tonight"), Some(Duration::hours(12)));
        assert_eq!(rules.detect("Deploy freeze this week"), Some(Duration::weeks(1)));
        assert_eq!(rules.detect("Budget review next month"), Some(Duration::days(62)));
        assert_eq!(rules.detect("Paris is in France"), None);
    }

    #[test]
    fn first_match_wins() {
        // "tomorrow" precedes "today" in the table
        let rules = ExpiryRules::default();
        assert_eq!(
            rules.detect("today we plan, tomorrow we ship"),
            Some(Duration::days(2))
        );
    }

    #[test]
    fn counted_phrases() {
        let rules = ExpiryRules::default();
        assert_eq!(rules.detect("remind me in 15 minutes"), Some(Duration::minutes(15)));
        assert_eq!(rules.detect("back in 1 hour"), Some(Duration::hours(1)));
        assert_eq!(rules.detect("release in 3 days"), Some(Duration::days(3)));
    }

    #[test]
    fn oversized_count_falls_through() {
        let rules = ExpiryRules::default();
        assert_eq!(rules.detect("in 99999999999999999999 days"), None);
    }

    #[test]
    fn meeting_phrase() {
        let rules = ExpiryRules::default();
        assert_eq!(rules.detect("Meeting at 3pm with Alex"), Some(Duration::days(1)));
        assert_eq!(rules.detect("interview @ 10"), Some(Duration::days(1)));
    }

    #[test]
    fn expires_at_is_relative_to_now() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let at = ExpiryRules::default().expires_at("standup today", now).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap());
    }

    #[test]
    fn cues_take_first_listed_phrase() {
        let cues = TemporalCues::default();
        let cue = cues.find("What did we decide yesterday? Also last week").unwrap();
        assert_eq!(cue.description, "yesterday");
        assert_eq!(cue.window, Duration::days(1));

        let cue = cues.find("anything from a few hours back").unwrap();
        assert_eq!(cue.window, Duration::hours(3));
        assert!(cues.find("nothing temporal").is_none());
    }
}
