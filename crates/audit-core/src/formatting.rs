/// Format a count with thousands separators.
///
/// # Examples
///
/// ```
/// use audit_core::formatting::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
pub fn format_count(value: usize) -> String {
    group_thousands(&value.to_string())
}

/// Format a signed difference with thousands separators.
///
/// # Examples
///
/// ```
/// use audit_core::formatting::format_delta;
///
/// assert_eq!(format_delta(0), "0");
/// assert_eq!(format_delta(-1500), "-1,500");
/// assert_eq!(format_delta(42), "42");
/// ```
pub fn format_delta(value: i64) -> String {
    let grouped = group_thousands(&value.unsigned_abs().to_string());
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Format a success percentage with five decimal places.
///
/// `None` means nothing was received, which renders as a notice instead of
/// a number.
///
/// # Examples
///
/// ```
/// use audit_core::formatting::format_percent;
///
/// assert_eq!(format_percent(Some(99.5)), "99.50000");
/// assert_eq!(format_percent(None), "n/a (no data in window)");
/// ```
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(pct) => format!("{:.5}", pct),
        None => "n/a (no data in window)".to_string(),
    }
}

/// Render an optional timestamp, using `-` when absent.
pub fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────
