//! Aggregate statistics and discrepancy listings for a reconciliation run.

use std::collections::{BTreeMap, BTreeSet};

use audit_core::error::{AuditError, Result};
use audit_core::models::{CrashEvent, HostInfo, Window};
use audit_core::time_utils::{parse_log_timestamp, slot_label, slot_start, zero_fill, TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::reconciler::{ReconcileStats, Reconciliation};

// ── Report types ──────────────────────────────────────────────────────────────

/// Ledger sizes and the derived success ratio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Counts {
    pub received: usize,
    pub saved: usize,
    /// `received - saved`; negative when more saves than receives were seen.
    pub delta: i64,
    /// `None` when nothing was received in the window.
    pub percent_success: Option<f64>,
}

/// First and last received timestamps actually seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedRange {
    pub first: String,
    pub last: String,
}

/// One row of the host tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSummary {
    pub host: String,
    pub pid: String,
    pub start: String,
    pub stop: String,
    pub latest: String,
    pub received: usize,
    pub saved: usize,
}

impl From<&HostInfo> for HostSummary {
    fn from(info: &HostInfo) -> Self {
        Self {
            host: info.host.clone(),
            pid: info.pid.clone(),
            start: info.start.clone(),
            stop: info.stop.clone(),
            latest: info.latest.clone(),
            received: info.received.len(),
            saved: info.saved.len(),
        }
    }
}

/// Number of discrepancies in one ten-minute slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotCount {
    /// `HH:M0` label.
    pub slot: String,
    /// Full slot start, `YYYY-MM-DD HH:MM:SS`, for windows spanning days.
    pub starts_at: String,
    pub count: usize,
}

/// Crashes present in one ledger but missing from the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Discrepancies {
    /// Sorted by event timestamp, then crash id.
    pub events: Vec<CrashEvent>,
    /// Zero-filled ten-minute histogram of `events`.
    pub histogram: Vec<SlotCount>,
    /// Events whose timestamp could not be placed in a slot.
    pub unslotted: usize,
}

/// Complete, render-ready result of one audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Window as requested.
    pub window: Window,
    pub counts: Counts,
    /// `None` when nothing was received.
    pub observed: Option<ObservedRange>,
    pub hosts_total: usize,
    /// Same number of receives and saves; by host then numeric pid.
    pub fine_hosts: Vec<HostSummary>,
    /// Counts differ; by first-seen timestamp.
    pub troubled_hosts: Vec<HostSummary>,
    /// Fine by count but the id sets differ.
    pub content_mismatch: Vec<HostSummary>,
    pub received_not_saved: Discrepancies,
    pub saved_not_received: Discrepancies,
    pub stats: ReconcileStats,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// `saved / received * 100`.
///
/// Fails with [`AuditError::NoDataInWindow`] when `received` is zero.
pub fn percent_success(received: usize, saved: usize) -> Result<f64> {
    if received == 0 {
        return Err(AuditError::NoDataInWindow);
    }
    Ok(saved as f64 / received as f64 * 100.0)
}

/// Build the full report for a finished run.
pub fn build_report(rec: &Reconciliation) -> Report {
    let received = rec.received.len();
    let saved = rec.saved.len();

    let counts = Counts {
        received,
        saved,
        delta: received as i64 - saved as i64,
        percent_success: percent_success(received, saved).ok(),
    };

    let observed = observed_range(&rec.received);
    let (fine_hosts, troubled_hosts, content_mismatch) = classify_hosts(&rec.hosts);

    let received_not_saved = difference(&rec.received, &rec.saved);
    let saved_not_received = difference(&rec.saved, &rec.received);

    Report {
        window: rec.window.clone(),
        counts,
        hosts_total: rec.hosts.len(),
        fine_hosts,
        troubled_hosts,
        content_mismatch,
        received_not_saved: discrepancies(received_not_saved, observed.as_ref()),
        saved_not_received: discrepancies(saved_not_received, observed.as_ref()),
        observed,
        stats: rec.stats.clone(),
    }
}

/// Split hosts into fine and troubled by receive/save counts.
///
/// Returns `(fine, troubled, content_mismatch)` where the last holds fine
/// hosts whose received and saved id sets are not equal.
pub fn classify_hosts(
    hosts: &BTreeMap<String, HostInfo>,
) -> (Vec<HostSummary>, Vec<HostSummary>, Vec<HostSummary>) {
    let mut fine: Vec<&HostInfo> = Vec::new();
    let mut troubled: Vec<&HostInfo> = Vec::new();

    for info in hosts.values() {
        if info.is_balanced() {
            fine.push(info);
        } else {
            troubled.push(info);
        }
    }

    fine.sort_by(|a, b| {
        (&a.host, a.pid_number(), &a.pid).cmp(&(&b.host, b.pid_number(), &b.pid))
    });
    troubled.sort_by(|a, b| (&a.start, &a.host, &a.pid).cmp(&(&b.start, &b.host, &b.pid)));

    let mismatch = fine
        .iter()
        .filter(|info| !info.ids_match())
        .map(|info| HostSummary::from(*info))
        .collect();

    (
        fine.into_iter().map(HostSummary::from).collect(),
        troubled.into_iter().map(HostSummary::from).collect(),
        mismatch,
    )
}

/// Events of `left` whose crash id is absent from `right`, by timestamp.
pub fn difference(
    left: &BTreeMap<String, CrashEvent>,
    right: &BTreeMap<String, CrashEvent>,
) -> Vec<CrashEvent> {
    let right_ids: BTreeSet<&String> = right.keys().collect();
    let mut events: Vec<CrashEvent> = left
        .iter()
        .filter(|(id, _)| !right_ids.contains(id))
        .map(|(_, event)| event.clone())
        .collect();
    events.sort_by(|a, b| (&a.timestamp, &a.crash_id).cmp(&(&b.timestamp, &b.crash_id)));
    events
}

/// Zero-filled ten-minute histogram of `events`.
///
/// Slots span from the top of the earliest hour to the last slot of the
/// latest hour, taking both `observed` and the events themselves into
/// account so no event falls outside the range.
pub fn histogram(events: &[CrashEvent], observed: Option<&ObservedRange>) -> (Vec<SlotCount>, usize) {
    let stamps: Vec<Option<NaiveDateTime>> = events
        .iter()
        .map(|e| parse_log_timestamp(&e.timestamp))
        .collect();

    let bounds: Vec<NaiveDateTime> = observed
        .into_iter()
        .flat_map(|r| [parse_log_timestamp(&r.first), parse_log_timestamp(&r.last)])
        .chain(stamps.iter().copied())
        .flatten()
        .collect();
    let (Some(first), Some(last)) = (bounds.iter().min(), bounds.iter().max()) else {
        return (Vec::new(), stamps.len());
    };

    let mut counts: BTreeMap<NaiveDateTime, usize> =
        zero_fill(*first, *last).into_iter().map(|slot| (slot, 0)).collect();

    let mut unslotted = 0;
    for stamp in stamps.iter().copied() {
        match stamp.map(slot_start).and_then(|slot| counts.get_mut(&slot)) {
            Some(count) => *count += 1,
            None => unslotted += 1,
        }
    }

    let slots = counts
        .into_iter()
        .map(|(slot, count)| {
            let starts_at = slot.format(TIMESTAMP_FORMAT).to_string();
            SlotCount {
                slot: slot_label(&starts_at).unwrap_or_default(),
                starts_at,
                count,
            }
        })
        .collect();
    (slots, unslotted)
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn observed_range(received: &BTreeMap<String, CrashEvent>) -> Option<ObservedRange> {
    let first = received.values().map(|e| &e.timestamp).min()?;
    let last = received.values().map(|e| &e.timestamp).max()?;
    Some(ObservedRange {
        first: first.clone(),
        last: last.clone(),
    })
}

fn discrepancies(events: Vec<CrashEvent>, observed: Option<&ObservedRange>) -> Discrepancies {
    let (histogram, unslotted) = histogram(&events, observed);
    Discrepancies {
        events,
        histogram,
        unslotted,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::models::Action;

    fn crash_id(n: u32) -> String {
        format!("{:08x}-0000-4000-8000-{:06x}200101", n, n)
    }

    fn event(ts: &str, host: &str, n: u32, action: Action) -> CrashEvent {
        CrashEvent {
            timestamp: ts.to_string(),
            host_process: host.to_string(),
            crash_id: Some(crash_id(n)),
            action,
        }
    }

    fn host(key: &str, start: &str, received: &[u32], saved: &[u32]) -> HostInfo {
        let mut info = HostInfo::new(key, start);
        info.received = received.iter().map(|n| crash_id(*n)).collect();
        info.saved = saved.iter().map(|n| crash_id(*n)).collect();
        info
    }

    fn ledger(events: &[CrashEvent]) -> BTreeMap<String, CrashEvent> {
        events
            .iter()
            .map(|e| (e.crash_id.clone().unwrap(), e.clone()))
            .collect()
    }

    fn reconciliation(received: &[CrashEvent], saved: &[CrashEvent]) -> Reconciliation {
        Reconciliation {
            window: Window::new("2020-01-01 09:00:00", "2020-01-01 12:00:00").unwrap(),
            hosts: BTreeMap::new(),
            received: ledger(received),
            saved: ledger(saved),
            stats: ReconcileStats::default(),
        }
    }

    // ── percent_success ───────────────────────────────────────────────────────

    #[test]
    fn test_percent_success() {
        assert!((percent_success(4, 3).unwrap() - 75.0).abs() < 1e-9);
        assert!((percent_success(2, 3).unwrap() - 150.0).abs() < 1e-9);
        assert!(matches!(
            percent_success(0, 5),
            Err(AuditError::NoDataInWindow)
        ));
    }

    // ── classify_hosts ────────────────────────────────────────────────────────

    #[test]
    fn test_classify_by_count_not_content() {
        let mut hosts = BTreeMap::new();
        hosts.insert("a 1".to_string(), host("a 1", "t1", &[1, 2, 3], &[1, 2, 4]));
        hosts.insert("b 1".to_string(), host("b 1", "t1", &[5, 6, 7], &[5, 6]));

        let (fine, troubled, mismatch) = classify_hosts(&hosts);
        assert_eq!(fine.len(), 1);
        assert_eq!(fine[0].host, "a");
        assert_eq!(troubled.len(), 1);
        assert_eq!(troubled[0].host, "b");
        assert_eq!((troubled[0].received, troubled[0].saved), (3, 2));
        assert_eq!(mismatch.len(), 1);
        assert_eq!(mismatch[0].host, "a");
    }

    #[test]
    fn test_fine_hosts_sorted_by_numeric_pid() {
        let mut hosts = BTreeMap::new();
        for key in ["web 100", "web 9", "api 50"] {
            hosts.insert(key.to_string(), host(key, "t", &[], &[]));
        }
        let (fine, _, mismatch) = classify_hosts(&hosts);
        let order: Vec<(&str, &str)> = fine
            .iter()
            .map(|h| (h.host.as_str(), h.pid.as_str()))
            .collect();
        assert_eq!(order, vec![("api", "50"), ("web", "9"), ("web", "100")]);
        assert!(mismatch.is_empty());
    }

    #[test]
    fn test_troubled_hosts_sorted_by_start() {
        let mut hosts = BTreeMap::new();
        hosts.insert(
            "a 1".to_string(),
            host("a 1", "2020-01-01 10:30:00", &[1], &[]),
        );
        hosts.insert(
            "z 1".to_string(),
            host("z 1", "2020-01-01 09:15:00", &[2], &[]),
        );
        let (_, troubled, _) = classify_hosts(&hosts);
        assert_eq!(troubled[0].host, "z");
        assert_eq!(troubled[1].host, "a");
    }

    // ── difference / histogram ────────────────────────────────────────────────

    #[test]
    fn test_difference_sorted_by_timestamp() {
        let received = ledger(&[
            event("2020-01-01 09:30:00", "a 1", 1, Action::Receive),
            event("2020-01-01 09:10:00", "a 1", 2, Action::Receive),
            event("2020-01-01 09:20:00", "a 1", 3, Action::Receive),
        ]);
        let saved = ledger(&[event("2020-01-01 09:21:00", "a 1", 3, Action::Save)]);

        let missing = difference(&received, &saved);
        let stamps: Vec<&str> = missing.iter().map(|e| e.timestamp.as_str()).collect();
        assert_eq!(stamps, vec!["2020-01-01 09:10:00", "2020-01-01 09:30:00"]);
        assert!(difference(&saved, &received).is_empty());
    }

    #[test]
    fn test_histogram_buckets_and_zero_fill() {
        let events = vec![
            event("2020-01-01 09:07:42", "a 1", 1, Action::Receive),
            event("2020-01-01 09:14:00", "a 1", 2, Action::Receive),
            event("2020-01-01 09:19:59", "a 1", 3, Action::Receive),
        ];
        let observed = ObservedRange {
            first: "2020-01-01 09:01:00".to_string(),
            last: "2020-01-01 10:02:00".to_string(),
        };
        let (slots, unslotted) = histogram(&events, Some(&observed));

        assert_eq!(unslotted, 0);
        assert_eq!(slots.len(), 12);
        assert_eq!(slots[0].slot, "09:00");
        assert_eq!(slots[0].count, 1);
        assert_eq!(slots[1].slot, "09:10");
        assert_eq!(slots[1].count, 2);
        assert_eq!(slots[11].slot, "10:50");
        assert_eq!(slots[11].starts_at, "2020-01-01 10:50:00");
        assert_eq!(slots.iter().map(|s| s.count).sum::<usize>(), 3);
    }

    #[test]
    fn test_histogram_labels_match_event_slots() {
        let events = vec![
            event("2020-01-01 23:58:10,493", "a 1", 1, Action::Receive),
            event("2020-01-02 00:04:00", "a 1", 2, Action::Receive),
        ];
        let (slots, _) = histogram(&events, None);

        for e in &events {
            let label = slot_label(&e.timestamp).unwrap();
            let hit: Vec<&SlotCount> = slots.iter().filter(|s| s.count > 0 && s.slot == label).collect();
            assert_eq!(hit.len(), 1, "no filled slot labelled {}", label);
        }
        assert_eq!(slots[0].slot, "23:00");
        assert_eq!(slots.last().unwrap().slot, "00:50");
    }

    #[test]
    fn test_histogram_extends_to_late_saves() {
        let events = vec![event("2020-01-01 12:03:00", "a 1", 1, Action::Save)];
        let observed = ObservedRange {
            first: "2020-01-01 11:40:00".to_string(),
            last: "2020-01-01 11:59:00".to_string(),
        };
        let (slots, unslotted) = histogram(&events, Some(&observed));
        assert_eq!(unslotted, 0);
        assert_eq!(slots.first().unwrap().starts_at, "2020-01-01 11:00:00");
        assert_eq!(slots.last().unwrap().starts_at, "2020-01-01 12:50:00");
        assert_eq!(slots[6].count, 1);
    }

    #[test]
    fn test_histogram_counts_unparseable_timestamps() {
        let events = vec![event("2020-01-01 9:7", "a 1", 1, Action::Receive)];
        let (slots, unslotted) = histogram(&events, None);
        assert!(slots.is_empty());
        assert_eq!(unslotted, 1);
    }

    // ── build_report ──────────────────────────────────────────────────────────

    #[test]
    fn test_build_report_counts_and_extent() {
        let rec = reconciliation(
            &[
                event("2020-01-01 09:30:00", "a 1", 1, Action::Receive),
                event("2020-01-01 09:10:00", "a 1", 2, Action::Receive),
                event("2020-01-01 11:50:00", "a 1", 3, Action::Receive),
            ],
            &[
                event("2020-01-01 09:31:00", "a 1", 1, Action::Save),
                event("2020-01-01 09:45:00", "a 1", 9, Action::Save),
            ],
        );
        let report = build_report(&rec);

        assert_eq!(report.counts.received, 3);
        assert_eq!(report.counts.saved, 2);
        assert_eq!(report.counts.delta, 1);
        assert!((report.counts.percent_success.unwrap() - 200.0 / 3.0).abs() < 1e-9);

        let observed = report.observed.unwrap();
        assert_eq!(observed.first, "2020-01-01 09:10:00");
        assert_eq!(observed.last, "2020-01-01 11:50:00");

        assert_eq!(report.received_not_saved.events.len(), 2);
        assert_eq!(report.saved_not_received.events.len(), 1);
        assert_eq!(report.received_not_saved.histogram.len(), 18);
        assert_eq!(report.saved_not_received.histogram.len(), 18);
        assert_eq!(report.received_not_saved.histogram[1].count, 1);
        assert_eq!(report.received_not_saved.histogram[17].count, 1);
        assert_eq!(report.saved_not_received.histogram[4].count, 1);
    }

    #[test]
    fn test_build_report_empty_window() {
        let report = build_report(&reconciliation(&[], &[]));
        assert_eq!(report.counts.received, 0);
        assert_eq!(report.counts.delta, 0);
        assert!(report.counts.percent_success.is_none());
        assert!(report.observed.is_none());
        assert!(report.received_not_saved.events.is_empty());
        assert!(report.received_not_saved.histogram.is_empty());
    }

    #[test]
    fn test_build_report_saves_only() {
        let rec = reconciliation(&[], &[event("2020-01-01 09:45:00", "a 1", 9, Action::Save)]);
        let report = build_report(&rec);
        assert_eq!(report.counts.delta, -1);
        assert!(report.counts.percent_success.is_none());
        assert_eq!(report.saved_not_received.histogram.len(), 6);
        assert_eq!(report.saved_not_received.histogram[4].count, 1);
    }
}
