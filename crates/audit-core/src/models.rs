use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{AuditError, Result};
use crate::time_utils::normalize_bound;

/// Number of characters in a crash identifier.
pub const CRASH_ID_LENGTH: usize = 36;

/// Key prefix under which raw crashes are stored in the object store.
pub const DEFAULT_KEY_PREFIX: &str = "v2/raw_crash";

/// Lifecycle step a log line reports for a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The collector accepted the crash report.
    Receive,
    /// The collector persisted the crash report.
    Save,
}

/// One structured record recovered from a collector log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashEvent {
    /// Content of the leading bracket token, `YYYY-MM-DD HH:MM:SS` first.
    pub timestamp: String,
    /// `"<host> <pid>"` as written in the `[ANTENNA ...]` tag.
    pub host_process: String,
    /// Present only when the candidate token was exactly 36 characters.
    pub crash_id: Option<String>,
    pub action: Action,
}

/// Lifecycle of one collector process as seen in the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub host: String,
    pub pid: String,
    /// Timestamp of the first event seen for this process.
    pub start: String,
    /// Timestamp of the most recently consumed event (last seen, not max).
    pub stop: String,
    /// Lexically greatest timestamp seen for this process.
    pub latest: String,
    /// Crash ids admitted as received, in consumption order.
    pub received: Vec<String>,
    /// Crash ids admitted as saved, in consumption order.
    pub saved: Vec<String>,
}

impl HostInfo {
    /// Create the record for `host_process` first seen at `timestamp`.
    ///
    /// The key is split on its first space into host and pid; a key with no
    /// space yields an empty pid.
    pub fn new(host_process: &str, timestamp: &str) -> Self {
        let (host, pid) = host_process.split_once(' ').unwrap_or((host_process, ""));
        Self {
            host: host.to_string(),
            pid: pid.to_string(),
            start: timestamp.to_string(),
            stop: timestamp.to_string(),
            latest: timestamp.to_string(),
            received: Vec::new(),
            saved: Vec::new(),
        }
    }

    /// Record that an event at `timestamp` was consumed for this process.
    pub fn observe(&mut self, timestamp: &str) {
        self.stop = timestamp.to_string();
        if timestamp > self.latest.as_str() {
            self.latest = timestamp.to_string();
        }
    }

    /// Coarse health check: as many saves as receives.
    pub fn is_balanced(&self) -> bool {
        self.received.len() == self.saved.len()
    }

    /// Strict health check: the received and saved id sets are identical.
    pub fn ids_match(&self) -> bool {
        let received: HashSet<&str> = self.received.iter().map(String::as_str).collect();
        let saved: HashSet<&str> = self.saved.iter().map(String::as_str).collect();
        received == saved
    }

    /// Pid as an integer for ordering; `None` when it is not numeric.
    pub fn pid_number(&self) -> Option<u64> {
        self.pid.parse().ok()
    }
}

/// Validated time window, both bounds normalized to `YYYY-MM-DD HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: String,
    pub end: String,
}

impl Window {
    /// Normalize and validate both bounds; `start` must not be after `end`.
    pub fn new(start: &str, end: &str) -> Result<Self> {
        let start = normalize_bound(start)?;
        let end = normalize_bound(end)?;
        if start > end {
            return Err(AuditError::Config(format!(
                "window start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }
}

/// Returns `true` when `candidate` has the length of a crash identifier.
pub fn is_crash_id(candidate: &str) -> bool {
    candidate.chars().count() == CRASH_ID_LENGTH
}

/// Submission date encoded in the id suffix, e.g. `"20160918"`.
pub fn crash_date(crash_id: &str) -> Result<String> {
    if !is_crash_id(crash_id) || !crash_id.is_ascii() {
        return Err(AuditError::InvalidCrashId(crash_id.to_string()));
    }
    let suffix = &crash_id[CRASH_ID_LENGTH - 6..];
    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuditError::InvalidCrashId(crash_id.to_string()));
    }
    Ok(format!("20{}", suffix))
}

/// Object-store key for a raw crash: `<prefix>/<entropy>/<date>/<id>`.
///
/// ```
/// use audit_core::models::{object_key, DEFAULT_KEY_PREFIX};
///
/// let key = object_key(DEFAULT_KEY_PREFIX, "de1bb258-cbbf-4589-a673-34f800160918").unwrap();
/// assert_eq!(key, "v2/raw_crash/de1/20160918/de1bb258-cbbf-4589-a673-34f800160918");
/// ```
pub fn object_key(prefix: &str, crash_id: &str) -> Result<String> {
    let date = crash_date(crash_id)?;
    let prefix = prefix.trim_end_matches('/');
    let entropy = &crash_id[..3];
    if prefix.is_empty() {
        Ok(format!("{}/{}/{}", entropy, date, crash_id))
    } else {
        Ok(format!("{}/{}/{}/{}", prefix, entropy, date, crash_id))
    }
}
