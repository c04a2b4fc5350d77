// Date <-> text conversion used by the coercer, the cell normalizer and the
// writer. Patterns use chrono strftime syntax.

use std::fmt::Write;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Pattern used when a field declares none, and for native date cells.
pub const DEFAULT_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// Parse `raw` with `pattern`. Patterns without time fields yield midnight.
pub fn parse_date(raw: &str, pattern: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let raw = raw.trim();
    match NaiveDateTime::parse_from_str(raw, pattern) {
        Ok(dt) => Ok(dt),
        Err(err) => NaiveDate::parse_from_str(raw, pattern)
            .map(|day| day.and_time(NaiveTime::MIN))
            .map_err(|_| err),
    }
}

/// Format `value` with `pattern`, falling back to [`DEFAULT_PATTERN`] when
/// the pattern contains an unknown specifier.
pub fn format_date(value: &NaiveDateTime, pattern: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", value.format(pattern)).is_err() {
        log::warn!("invalid date pattern '{}', using default", pattern);
        return value.format(DEFAULT_PATTERN).to_string();
    }
    out
}
