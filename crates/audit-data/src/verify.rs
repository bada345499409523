//! Confirm that crash ids reached the crash store.
//!
//! The queue and the store are capabilities behind [`CrashQueue`] and
//! [`ObjectStore`]. Local implementations back both with files so that a
//! list of ids can be checked against a mirror of the bucket.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use audit_core::error::{AuditError, Result};
use audit_core::models::object_key;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::reader::open_log;

// ── Capabilities ──────────────────────────────────────────────────────────────

/// Source of crash ids that must be acknowledged once handled.
pub trait CrashQueue {
    /// Next id, or `None` when the queue is drained.
    fn next_item(&mut self) -> Result<Option<String>>;

    /// Mark `item` as handled.
    fn ack(&mut self, item: &str) -> Result<()>;
}

/// Existence check against the crash store.
pub trait ObjectStore {
    fn exists(&self, key: &str) -> Result<bool>;
}

// ── Results ───────────────────────────────────────────────────────────────────

/// Why a crash id did not verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum MissReason {
    InvalidId,
    NotFound,
    StoreError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Miss {
    pub crash_id: String,
    #[serde(flatten)]
    pub reason: MissReason,
}

/// Totals for one drain of the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub total: usize,
    pub found: usize,
    pub missing: Vec<Miss>,
}

// ── Driver ────────────────────────────────────────────────────────────────────

/// Drain `queue`, checking every id against `store`.
///
/// Every item is acknowledged whether or not it was found. Store failures
/// are recorded per id and never retried; a queue failure ends the drain.
pub fn verify_crashes<Q, S>(queue: &mut Q, store: &S, key_prefix: &str) -> Result<VerifyReport>
where
    Q: CrashQueue + ?Sized,
    S: ObjectStore + ?Sized,
{
    let mut report = VerifyReport::default();

    while let Some(crash_id) = queue.next_item()? {
        report.total += 1;
        debug!("{}: pulled from queue", crash_id);

        match object_key(key_prefix, &crash_id) {
            Ok(key) => match store.exists(&key) {
                Ok(true) => {
                    debug!("{}: exists--success!", crash_id);
                    report.found += 1;
                }
                Ok(false) => {
                    warn!("{}: not found at {}", crash_id, key);
                    report.missing.push(Miss {
                        crash_id: crash_id.clone(),
                        reason: MissReason::NotFound,
                    });
                }
                Err(e) => {
                    warn!("{}: {}", crash_id, e);
                    report.missing.push(Miss {
                        crash_id: crash_id.clone(),
                        reason: MissReason::StoreError(e.to_string()),
                    });
                }
            },
            Err(_) => {
                warn!("{}: not a crash id", crash_id);
                report.missing.push(Miss {
                    crash_id: crash_id.clone(),
                    reason: MissReason::InvalidId,
                });
            }
        }

        queue.ack(&crash_id)?;
    }

    info!(
        "Verified {} crash ids: {} found, {} missing",
        report.total,
        report.found,
        report.missing.len()
    );
    Ok(report)
}

// ── Local implementations ─────────────────────────────────────────────────────

/// Queue over a text file of crash ids, one per line.
#[derive(Debug, Default)]
pub struct IdListQueue {
    pending: VecDeque<String>,
    acked: usize,
}

impl IdListQueue {
    /// Queue holding `ids` in order; blank entries are dropped.
    pub fn new<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let pending = ids
            .into_iter()
            .map(Into::into)
            .map(|id: String| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        Self { pending, acked: 0 }
    }

    /// Load ids from `path` (plain or gzip). Undecodable lines are skipped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut ids = Vec::new();
        for line in open_log(path)? {
            match line {
                Ok(id) => ids.push(id),
                Err(AuditError::LineDecode { line, .. }) => {
                    debug!("Skipping undecodable id on line {}", line);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Self::new(ids))
    }

    /// Number of items acknowledged so far.
    pub fn acked(&self) -> usize {
        self.acked
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl CrashQueue for IdListQueue {
    fn next_item(&mut self) -> Result<Option<String>> {
        Ok(self.pending.pop_front())
    }

    fn ack(&mut self, _item: &str) -> Result<()> {
        self.acked += 1;
        Ok(())
    }
}

/// Store backed by a local directory laid out like the bucket.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ObjectStore for DirectoryStore {
    fn exists(&self, key: &str) -> Result<bool> {
        if key.split('/').any(|part| part == "..") {
            return Err(AuditError::Store(format!("refusing key {}", key)));
        }
        let path = self.root.join(key);
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AuditError::Store(format!("{}: {}", path.display(), e))),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
