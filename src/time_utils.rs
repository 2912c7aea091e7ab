// SPDX-License-Identifier: MIT

//! Small helpers for consistent timestamp formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current time as an RFC3339 string (UTC, second precision).
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a client-supplied RFC3339 timestamp and normalize it to UTC second
/// precision. Stored timestamps are compared as strings, so everything must
/// share one form for lexicographic order to match chronological order.
pub fn normalize_rfc3339(raw: &str) -> Result<String, chrono::ParseError> {
    let parsed = DateTime::parse_from_rfc3339(raw)?;
    Ok(parsed
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_converts_offsets_to_utc() {
        assert_eq!(
            normalize_rfc3339("2026-08-03T11:00:00+02:00").unwrap(),
            "2026-08-03T09:00:00Z"
        );
        assert_eq!(
            normalize_rfc3339("2026-08-03T09:00:00Z").unwrap(),
            "2026-08-03T09:00:00Z"
        );
    }

    #[test]
    fn test_normalize_rejects_non_timestamps() {
        assert!(normalize_rfc3339("yesterday").is_err());
        assert!(normalize_rfc3339("2026-08-03").is_err());
    }
}
