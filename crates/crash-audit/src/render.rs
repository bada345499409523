use std::io::Write;

use audit_core::formatting::{format_count, format_delta, format_percent, or_dash};
use audit_core::models::CrashEvent;
use audit_core::settings::OutputFormat;
use audit_data::analysis::AnalysisResult;
use audit_data::report::{Discrepancies, HostSummary, Report};
use audit_data::verify::{MissReason, VerifyReport};
use serde::Serialize;

// ── Entry points ───────────────────────────────────────────────────────────────

/// Write a reconciliation result in the requested format.
pub fn render_analysis<W: Write>(
    out: &mut W,
    result: &AnalysisResult,
    format: OutputFormat,
    strict_hosts: bool,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => write_json(out, result),
        OutputFormat::Text => write_report(out, &result.report, strict_hosts),
    }
}

/// Write a verification result in the requested format.
pub fn render_verify<W: Write>(
    out: &mut W,
    report: &VerifyReport,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => write_json(out, report),
        OutputFormat::Text => write_verify(out, report),
    }
}

fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

// ── Text report ────────────────────────────────────────────────────────────────

fn write_report<W: Write>(out: &mut W, report: &Report, strict_hosts: bool) -> anyhow::Result<()> {
    writeln!(out, "From {} to {}", report.window.start, report.window.end)?;
    writeln!(out)?;
    writeln!(out, "total crashes in:  {}", format_count(report.counts.received))?;
    writeln!(out, "total crashes out: {}", format_count(report.counts.saved))?;
    writeln!(out, "delta:             {}", format_delta(report.counts.delta))?;
    writeln!(
        out,
        "percent success:   {}",
        format_percent(report.counts.percent_success)
    )?;
    writeln!(out)?;

    let observed = report.observed.as_ref();
    writeln!(
        out,
        "first crash received:  {}",
        or_dash(observed.map(|o| o.first.as_str()))
    )?;
    writeln!(
        out,
        "last crash received:   {}",
        or_dash(observed.map(|o| o.last.as_str()))
    )?;
    writeln!(out)?;

    writeln!(out, "Hosts ({}):", report.hosts_total)?;
    writeln!(out)?;
    write_hosts(out, "Hosts that did fine", &report.fine_hosts)?;
    write_hosts(out, "Hosts that had trouble", &report.troubled_hosts)?;
    if strict_hosts {
        write_hosts(
            out,
            "Hosts with matching counts but different crashes",
            &report.content_mismatch,
        )?;
    }

    write_discrepancies(out, "Received but not saved", &report.received_not_saved)?;
    write_discrepancies(out, "Saved but not received", &report.saved_not_received)?;

    let stats = &report.stats;
    if stats.sources_cut_short > 0 || stats.sources_failed > 0 {
        writeln!(
            out,
            "Sources: {} read, {} cut short past the window, {} ended by read errors",
            stats.sources, stats.sources_cut_short, stats.sources_failed
        )?;
    }
    Ok(())
}

fn write_hosts<W: Write>(out: &mut W, title: &str, hosts: &[HostSummary]) -> anyhow::Result<()> {
    writeln!(out, "{} ({}):", title, hosts.len())?;
    for host in hosts {
        writeln!(
            out,
            "   {:<68}  {:>3}  {:>26}  {:>26}  {:>6}  {:>6}",
            host.host, host.pid, host.start, host.stop, host.received, host.saved
        )?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_discrepancies<W: Write>(
    out: &mut W,
    title: &str,
    section: &Discrepancies,
) -> anyhow::Result<()> {
    writeln!(out, "{} ({}):", title, section.events.len())?;
    for event in &section.events {
        write_event(out, event)?;
    }

    if !section.events.is_empty() {
        writeln!(out)?;
        writeln!(out, "By timestamp:")?;
        for slot in &section.histogram {
            writeln!(out, "   {}: {}", slot.slot, slot.count)?;
        }
        if section.unslotted > 0 {
            writeln!(out, "   (unparsed timestamps): {}", section.unslotted)?;
        }
    }
    writeln!(out)?;
    Ok(())
}

fn write_event<W: Write>(out: &mut W, event: &CrashEvent) -> anyhow::Result<()> {
    writeln!(
        out,
        "   {}  {:<70}  {}",
        event.timestamp,
        event.host_process,
        event.crash_id.as_deref().unwrap_or("")
    )?;
    Ok(())
}

// ── Text verification ──────────────────────────────────────────────────────────

fn write_verify<W: Write>(out: &mut W, report: &VerifyReport) -> anyhow::Result<()> {
    writeln!(out, "Total lines: {}", format_count(report.total))?;
    writeln!(out, "  Success: {}", format_count(report.found))?;
    writeln!(out, "  Fails:   {}", format_count(report.missing.len()))?;
    for miss in &report.missing {
        let reason = match &miss.reason {
            MissReason::InvalidId => "invalid crash id".to_string(),
            MissReason::NotFound => "not found".to_string(),
            MissReason::StoreError(detail) => detail.clone(),
        };
        writeln!(out, "FAIL: {} {}", miss.crash_id, reason)?;
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
