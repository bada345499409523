//! Tokenizer for collector log lines.
//!
//! Lines look like
//!
//! ```text
//! [2020-01-01 09:07:42,493] [ANTENNA web-1 7532] [INFO] antenna.breakpad_resource: <crash id>: saved
//! ```
//!
//! and are consumed left to right: three bracket tokens, the logging
//! source, the crash id candidate, then whatever text remains.

use audit_core::models::{is_crash_id, Action, CrashEvent};

/// Tag that precedes `host pid` in the second bracket token.
pub const HOST_TAG: &str = "ANTENNA ";

/// Parse one log line into a [`CrashEvent`].
///
/// Returns `None` when the line does not start with `[` or its bracket
/// structure is broken. A line whose candidate id is not 36 characters long
/// still parses, with `crash_id` set to `None`.
pub fn parse_line(line: &str) -> Option<CrashEvent> {
    let line = line.trim_end();
    if !line.starts_with('[') {
        return None;
    }

    let (timestamp, rest) = bracket_token(line)?;

    let (host, rest) = bracket_token(rest)?;
    let host_process = host.strip_prefix(HOST_TAG).unwrap_or(host);

    // log level
    let (_, rest) = bracket_token(rest)?;

    // logging source
    let (_, rest) = bounded_token(rest, ' ')?;

    // The candidate may be the last thing on the line.
    let (candidate, rest) = bounded_token(rest, ' ').unwrap_or((rest, ""));
    let candidate = candidate.strip_suffix(':').unwrap_or(candidate);
    let crash_id = is_crash_id(candidate).then(|| candidate.to_string());

    let action = if rest.trim().starts_with("saved") {
        Action::Save
    } else {
        Action::Receive
    };

    Some(CrashEvent {
        timestamp: timestamp.to_string(),
        host_process: host_process.to_string(),
        crash_id,
        action,
    })
}

/// Split off the text before the first `bound`.
fn bounded_token(line: &str, bound: char) -> Option<(&str, &str)> {
    line.split_once(bound)
}

/// Split off the next `[...]` token, returning its inner text.
fn bracket_token(line: &str) -> Option<(&str, &str)> {
    let (token, rest) = line.split_once("] ")?;
    let inner = token.trim().strip_prefix('[')?;
    Some((inner, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "de1bb258-cbbf-4589-a673-34f800160918";

    fn line(ts: &str, host: &str, id: &str, tail: &str) -> String {
        format!(
            "[{}] [ANTENNA {}] [INFO] antenna.breakpad_resource: {}: {}",
            ts, host, id, tail
        )
    }

    #[test]
    fn test_parse_receive_line() {
        let raw = line(
            "2020-01-01 09:07:42,493",
            "web-1 7532",
            ID,
            "matched by is_firefox_desktop; returned ACCEPT",
        );
        let event = parse_line(&raw).expect("parses");
        assert_eq!(event.timestamp, "2020-01-01 09:07:42,493");
        assert_eq!(event.host_process, "web-1 7532");
        assert_eq!(event.crash_id.as_deref(), Some(ID));
        assert_eq!(event.action, Action::Receive);
    }

    #[test]
    fn test_parse_save_line() {
        let raw = line("2020-01-01 09:07:43", "web-1 7532", ID, "saved");
        let event = parse_line(&raw).expect("parses");
        assert_eq!(event.action, Action::Save);
    }

    #[test]
    fn test_saved_must_lead_the_remainder() {
        let raw = line("2020-01-01 09:07:43", "web-1 7532", ID, "not saved");
        assert_eq!(parse_line(&raw).unwrap().action, Action::Receive);
    }

    #[test]
    fn test_wrong_length_id_yields_no_crash_id() {
        let raw = line("2020-01-01 09:07:43", "web-1 7532", &ID[..35], "saved");
        let event = parse_line(&raw).expect("still parses");
        assert!(event.crash_id.is_none());
        assert_eq!(event.action, Action::Save);

        let long = format!("{}x", ID);
        let raw = line("2020-01-01 09:07:43", "web-1 7532", &long, "saved");
        assert!(parse_line(&raw).unwrap().crash_id.is_none());
    }

    #[test]
    fn test_only_one_trailing_colon_is_stripped() {
        // 35 characters plus two colons: stripping one leaves 36 with a colon.
        let raw = format!(
            "[2020-01-01 09:07:43] [ANTENNA web-1 7532] [INFO] src {}:: saved",
            &ID[..35]
        );
        let event = parse_line(&raw).unwrap();
        assert_eq!(event.crash_id, Some(format!("{}:", &ID[..35])));
        assert_eq!(event.action, Action::Save);

        // A full id with two colons is left at 37 characters.
        let raw = format!(
            "[2020-01-01 09:07:43] [ANTENNA web-1 7532] [INFO] src {}:: saved",
            ID
        );
        assert!(parse_line(&raw).unwrap().crash_id.is_none());
    }

    #[test]
    fn test_candidate_at_end_of_line() {
        let raw = format!(
            "[2020-01-01 09:07:43] [ANTENNA web-1 7532] [INFO] antenna.breakpad_resource: {}\n",
            ID
        );
        let event = parse_line(&raw).unwrap();
        assert_eq!(event.crash_id.as_deref(), Some(ID));
        assert_eq!(event.action, Action::Receive);
    }

    #[test]
    fn test_rejects_lines_without_leading_bracket() {
        assert!(parse_line("").is_none());
        assert!(parse_line(" [2020-01-01 09:07:43] [ANTENNA a 1] [INFO] s x").is_none());
        assert!(parse_line("Traceback (most recent call last):").is_none());
    }

    #[test]
    fn test_rejects_broken_brackets() {
        assert!(parse_line("[2020-01-01 09:07:43").is_none());
        assert!(parse_line("[2020-01-01 09:07:43] [ANTENNA web-1 7532").is_none());
        assert!(parse_line("[2020-01-01 09:07:43] [ANTENNA web-1 7532] [INFO").is_none());
        assert!(parse_line("[2020-01-01 09:07:43] ANTENNA web-1 7532] [INFO] s x").is_none());
    }

    #[test]
    fn test_rejects_missing_source_separator() {
        assert!(parse_line("[2020-01-01 09:07:43] [ANTENNA web-1 7532] [INFO] lonely").is_none());
    }

    #[test]
    fn test_host_without_tag_is_kept_verbatim() {
        let raw = format!("[2020-01-01 09:07:43] [web-1 7532] [INFO] src {}: saved", ID);
        assert_eq!(parse_line(&raw).unwrap().host_process, "web-1 7532");
    }

    #[test]
    fn test_deterministic() {
        let raw = line("2020-01-01 09:07:43", "web-1 7532", ID, "saved");
        assert_eq!(parse_line(&raw), parse_line(&raw));
    }

    #[test]
    fn test_multibyte_input_does_not_panic() {
        assert!(parse_line("[é] [ANTENNA ü 1] [ß] ñ ☃☃☃: saved").is_some());
        assert!(parse_line("[日本語").is_none());
    }
}
