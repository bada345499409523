//! Main audit pipeline.
//!
//! Orchestrates file discovery, reconciliation and report building,
//! returning an [`AnalysisResult`] ready for rendering.

use chrono::Utc;
use serde::Serialize;

use audit_core::error::Result;
use audit_core::settings::AuditConfig;

use crate::reader::collect_log_files;
use crate::reconciler::reconcile;
use crate::report::{build_report, Report};

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside the report.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this result was generated.
    pub generated_at: String,
    /// Number of files read after expanding directories.
    pub files_scanned: usize,
    /// Wall-clock seconds spent reading and reconciling logs.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent building the report.
    pub report_time_seconds: f64,
}

/// The complete output of [`analyze_logs`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub report: Report,
    pub metadata: AnalysisMetadata,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full audit pipeline.
///
/// 1. Expand the configured inputs into log files.
/// 2. Reconcile every file over the window.
/// 3. Build the report.
///
/// Any file that cannot be opened fails the run.
pub fn analyze_logs(config: &AuditConfig) -> Result<AnalysisResult> {
    // ── Step 1: Discover files ────────────────────────────────────────────────
    let files = collect_log_files(&config.inputs)?;
    tracing::debug!("Auditing {} files", files.len());

    // ── Step 2: Reconcile ─────────────────────────────────────────────────────
    let load_start = std::time::Instant::now();
    let reconciliation = reconcile(&config.window, config.beyond_limit, &files)?;
    let load_time = load_start.elapsed().as_secs_f64();

    // ── Step 3: Report ────────────────────────────────────────────────────────
    let report_start = std::time::Instant::now();
    let report = build_report(&reconciliation);
    let report_time = report_start.elapsed().as_secs_f64();

    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        files_scanned: files.len(),
        load_time_seconds: load_time,
        report_time_seconds: report_time,
    };

    Ok(AnalysisResult { report, metadata })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
