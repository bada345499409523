use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use tracing::debug;

use crate::error::{AuditError, Result};

/// Layout shared by log timestamps and window bounds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Length of a `YYYY-MM-DD HH:MM:SS` timestamp.
pub const TIMESTAMP_LEN: usize = 19;

/// Width of one histogram slot in minutes.
pub const SLOT_MINUTES: i64 = 10;

// ── Window bounds ─────────────────────────────────────────────────────────────

/// Validate a user-supplied window bound and pad it to the full layout.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM` and `YYYY-MM-DD HH:MM:SS`.
/// Missing fields are zero, so lexical comparison against log timestamps
/// stays meaningful.
///
/// ```
/// use audit_core::time_utils::normalize_bound;
///
/// assert_eq!(normalize_bound("2020-01-01").unwrap(), "2020-01-01 00:00:00");
/// assert_eq!(normalize_bound("2020-01-01 09:30").unwrap(), "2020-01-01 09:30:00");
/// assert!(normalize_bound("noon").is_err());
/// ```
pub fn normalize_bound(raw: &str) -> Result<String> {
    let s = raw.trim();

    for fmt in [TIMESTAMP_FORMAT, "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.format(TIMESTAMP_FORMAT).to_string());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(format!("{} 00:00:00", date.format("%Y-%m-%d")));
    }

    Err(AuditError::InvalidTimestamp(raw.to_string()))
}

// ── Log timestamps ────────────────────────────────────────────────────────────

/// Up to 19 characters following the opening bracket of a log line.
///
/// This is the cheap windowing key; it does not validate anything.
pub fn window_key(line: &str) -> &str {
    let rest = line.strip_prefix('[').unwrap_or(line);
    match rest.char_indices().nth(TIMESTAMP_LEN) {
        Some((idx, _)) => &rest[..idx],
        None => rest,
    }
}

/// Parse the leading `YYYY-MM-DD HH:MM:SS` of a log timestamp.
///
/// Trailing fractions or offsets (`,493`, ` +0000`) are ignored.
pub fn parse_log_timestamp(ts: &str) -> Option<NaiveDateTime> {
    let head = ts.get(..TIMESTAMP_LEN)?;
    match NaiveDateTime::parse_from_str(head, TIMESTAMP_FORMAT) {
        Ok(dt) => Some(dt),
        Err(e) => {
            debug!("could not parse log timestamp \"{}\": {}", ts, e);
            None
        }
    }
}

// ── Ten-minute slots ──────────────────────────────────────────────────────────

/// `HH:M0` label of the slot containing `ts`.
///
/// ```
/// use audit_core::time_utils::slot_label;
///
/// assert_eq!(slot_label("2020-01-01 09:07:42").as_deref(), Some("09:00"));
/// assert_eq!(slot_label("2020-01-01 09:14:00").as_deref(), Some("09:10"));
/// ```
pub fn slot_label(ts: &str) -> Option<String> {
    ts.get(11..15).map(|hm| format!("{}0", hm))
}

/// Truncate `dt` to the start of its ten-minute slot.
pub fn slot_start(dt: NaiveDateTime) -> NaiveDateTime {
    let minute = dt.minute() - dt.minute() % SLOT_MINUTES as u32;
    dt.with_minute(minute)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Every slot from the top of `first`'s hour through the `:50` slot of
/// `last`'s hour, inclusive.
pub fn zero_fill(first: NaiveDateTime, last: NaiveDateTime) -> Vec<NaiveDateTime> {
    let mut cursor = top_of_hour(first);
    let end = top_of_hour(last) + TimeDelta::minutes(60 - SLOT_MINUTES);

    let mut slots = Vec::new();
    while cursor <= end {
        slots.push(cursor);
        cursor += TimeDelta::minutes(SLOT_MINUTES);
    }
    slots
}

fn top_of_hour(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}
