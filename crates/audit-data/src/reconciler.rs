//! Receive/save reconciliation over a time window.
//!
//! A [`Reconciler`] owns all state for one run: the per-process
//! [`HostInfo`] table and the received and saved ledgers. Feed it line
//! streams with [`Reconciler::consume`] and take the result with
//! [`Reconciler::finish`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use audit_core::error::{AuditError, Result};
use audit_core::models::{Action, CrashEvent, HostInfo, Window};
use audit_core::settings::DEFAULT_BEYOND_LIMIT;
use audit_core::time_utils::window_key;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::parser::parse_line;
use crate::reader::open_log;

/// Literal that every collector line carries in its host tag.
const TAG_MARKER: &str = "[ANTENNA";

// ── Output types ──────────────────────────────────────────────────────────────

/// Line and event counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Sources consumed, including ones abandoned early.
    pub sources: usize,
    /// Sources abandoned because the beyond-window limit was exceeded.
    pub sources_cut_short: usize,
    /// Sources that ended on a read error.
    pub sources_failed: usize,
    pub lines_read: u64,
    /// Lines without a leading `[` or without the host tag.
    pub lines_ignored: u64,
    pub lines_undecodable: u64,
    pub lines_before_window: u64,
    pub lines_beyond_window: u64,
    /// In-window lines that failed to tokenize or carried no crash id.
    pub lines_unparsed: u64,
    /// Events with a crash id that reached the admission rule.
    pub events_processed: u64,
    /// Events written to one of the ledgers.
    pub events_admitted: u64,
}

/// Everything a reconciliation run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub window: Window,
    /// Keyed by `"<host> <pid>"`.
    pub hosts: BTreeMap<String, HostInfo>,
    /// Crash id to the last admitted receive event.
    pub received: BTreeMap<String, CrashEvent>,
    /// Crash id to the last admitted save event.
    pub saved: BTreeMap<String, CrashEvent>,
    pub stats: ReconcileStats,
}

/// Whether the caller should keep feeding lines from the current source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFlow {
    Continue,
    StopSource,
}

// ── Reconciler ────────────────────────────────────────────────────────────────

/// Run-scoped reconciliation state.
pub struct Reconciler {
    window: Window,
    beyond_limit: usize,
    hosts: BTreeMap<String, HostInfo>,
    received: BTreeMap<String, CrashEvent>,
    saved: BTreeMap<String, CrashEvent>,
    stats: ReconcileStats,
}

impl Reconciler {
    /// Start an empty run over `window` with the default beyond-window limit.
    pub fn new(window: Window) -> Self {
        Self {
            window,
            beyond_limit: DEFAULT_BEYOND_LIMIT,
            hosts: BTreeMap::new(),
            received: BTreeMap::new(),
            saved: BTreeMap::new(),
            stats: ReconcileStats::default(),
        }
    }

    /// Number of past-the-end lines tolerated for the whole run.
    pub fn with_beyond_limit(mut self, limit: usize) -> Self {
        self.beyond_limit = limit;
        self
    }

    // ── Public methods ────────────────────────────────────────────────────────

    /// Consume one line source until it ends or the beyond-window limit
    /// stops it.
    ///
    /// Undecodable lines are counted and skipped. A read error ends this
    /// source but not the run.
    pub fn consume<I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = Result<String>>,
    {
        self.stats.sources += 1;

        for item in lines {
            match item {
                Ok(line) => {
                    if self.consume_line(&line) == LineFlow::StopSource {
                        debug!(
                            "Beyond-window limit of {} exceeded; abandoning source",
                            self.beyond_limit
                        );
                        self.stats.sources_cut_short += 1;
                        break;
                    }
                }
                Err(AuditError::LineDecode { path, line }) => {
                    debug!("Skipping undecodable line {} in {}", line, path.display());
                    self.stats.lines_undecodable += 1;
                }
                Err(e) => {
                    warn!("Stopped reading source early: {}", e);
                    self.stats.sources_failed += 1;
                    break;
                }
            }
        }
    }

    /// Apply one raw line to the run state.
    pub fn consume_line(&mut self, line: &str) -> LineFlow {
        self.stats.lines_read += 1;

        if !line.starts_with('[') || !line.contains(TAG_MARKER) {
            self.stats.lines_ignored += 1;
            return LineFlow::Continue;
        }

        let key = window_key(line);
        if key < self.window.start.as_str() {
            self.stats.lines_before_window += 1;
            return LineFlow::Continue;
        }
        if key > self.window.end.as_str() {
            self.stats.lines_beyond_window += 1;
            if self.stats.lines_beyond_window > self.beyond_limit as u64 {
                return LineFlow::StopSource;
            }
        }

        let Some(event) = parse_line(line.trim()) else {
            self.stats.lines_unparsed += 1;
            return LineFlow::Continue;
        };
        let Some(crash_id) = event.crash_id.clone() else {
            self.stats.lines_unparsed += 1;
            return LineFlow::Continue;
        };

        self.stats.events_processed += 1;
        self.admit(crash_id, event);
        LineFlow::Continue
    }

    /// Close the run and hand back hosts, ledgers and counters.
    pub fn finish(self) -> Reconciliation {
        info!(
            "lines: {} processed, {} admitted ({} received, {} saved, {} hosts)",
            self.stats.events_processed,
            self.stats.events_admitted,
            self.received.len(),
            self.saved.len(),
            self.hosts.len()
        );
        debug!("Reconcile stats: {:?}", self.stats);

        Reconciliation {
            window: self.window,
            hosts: self.hosts,
            received: self.received,
            saved: self.saved,
            stats: self.stats,
        }
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    /// Update host lifecycle and apply the asymmetric admission rule.
    ///
    /// Receives count only before the window end. Saves count before the
    /// end, or after it when the same crash was already received.
    fn admit(&mut self, crash_id: String, event: CrashEvent) {
        let host = self
            .hosts
            .entry(event.host_process.clone())
            .or_insert_with(|| HostInfo::new(&event.host_process, &event.timestamp));
        host.observe(&event.timestamp);

        let before_end = event.timestamp.as_str() < self.window.end.as_str();

        match event.action {
            Action::Receive if before_end => {
                host.received.push(crash_id.clone());
                self.received.insert(crash_id, event);
                self.stats.events_admitted += 1;
            }
            Action::Save if before_end || self.received.contains_key(&crash_id) => {
                host.saved.push(crash_id.clone());
                self.saved.insert(crash_id, event);
                self.stats.events_admitted += 1;
            }
            _ => {}
        }
    }
}

// ── Public function ───────────────────────────────────────────────────────────

/// Reconcile every file in `files` over `window`.
///
/// Files are consumed in sorted order. A file that cannot be opened fails
/// the whole run.
pub fn reconcile(window: &Window, beyond_limit: usize, files: &[PathBuf]) -> Result<Reconciliation> {
    let mut ordered: Vec<&PathBuf> = files.iter().collect();
    ordered.sort();
    ordered.dedup();

    let mut reconciler = Reconciler::new(window.clone()).with_beyond_limit(beyond_limit);
    for path in ordered {
        let lines = open_log(path)?;
        debug!("Reconciling {}", path.display());
        reconciler.consume(lines);
    }

    Ok(reconciler.finish())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
