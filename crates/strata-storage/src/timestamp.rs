// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamp encoding for TEXT columns.
//!
//! Every timestamp is stored as fixed-width UTC with microsecond precision,
//! so lexicographic order in SQL matches chronological order.

use chrono::{DateTime, NaiveDateTime, Utc};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Encode a UTC instant for storage.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

/// Current time, encoded for storage.
pub fn now_ts() -> String {
    format_ts(Utc::now())
}

/// Decode a stored timestamp.
///
/// Also accepts RFC 3339 input so hand-written values in imported data parse.
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}
