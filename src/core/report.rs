// SupportLens - core/report.rs
//
// Plain-text analysis report rendered from the aggregates.

use crate::core::aggregate::Aggregates;
use std::fmt::{self, Write};

const RULE_WIDTH: usize = 60;

/// Context lines printed in the report header.
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    pub source: String,
    pub ruleset: String,
    pub policy: String,
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn opt(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.1} {unit}"),
        None => "n/a".to_string(),
    }
}

fn section(out: &mut String, title: &str) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "-".repeat(RULE_WIDTH))
}

fn write_report(out: &mut String, agg: &Aggregates, ctx: &ReportContext) -> fmt::Result {
    let s = &agg.summary;

    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "SUPPORT CHAT ANALYSIS REPORT")?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "Source   : {}", ctx.source)?;
    writeln!(out, "Rules    : {}", ctx.ruleset)?;
    writeln!(out, "Grouping : {}", ctx.policy)?;

    section(out, "OVERVIEW")?;
    writeln!(out, "Total issues identified    : {}", s.total_issues)?;
    writeln!(out, "Total messages analysed    : {}", s.total_messages)?;
    writeln!(out, "Records skipped            : {}", s.skipped_records)?;
    writeln!(out, "Active customers           : {}", s.customers)?;
    writeln!(out, "Support staff members      : {}", s.support_staff)?;

    section(out, "KEY PERFORMANCE INDICATORS")?;
    writeln!(out, "Resolution rate            : {:.1}%", s.resolution_rate * 100.0)?;
    writeln!(out, "Response rate              : {:.1}%", s.response_rate * 100.0)?;
    writeln!(
        out,
        "Avg first response time    : {}",
        opt(s.mean_response_minutes, "minutes")
    )?;
    writeln!(
        out,
        "Avg resolution time        : {}",
        opt(s.mean_resolution_hours, "hours")
    )?;
    writeln!(
        out,
        "Min / max response time    : {} / {}",
        opt(agg.response_times.min, "minutes"),
        opt(agg.response_times.max, "minutes")
    )?;
    if let Some(res) = &agg.resolution_times {
        writeln!(
            out,
            "Median resolution time     : {:.1} hours (Q1 {:.1}, Q3 {:.1})",
            res.summary.median, res.summary.q1, res.summary.q3
        )?;
    }

    section(out, "ISSUE STATUS BREAKDOWN")?;
    for (label, count) in [
        ("Resolved", s.resolved),
        ("Pending", s.pending),
        ("No response", s.no_response),
    ] {
        writeln!(
            out,
            "{label:<27}: {count} ({:.1}%)",
            pct(count, s.total_issues)
        )?;
    }

    section(out, "TOP ISSUE CATEGORIES")?;
    for (i, c) in agg.categories.iter().take(5).enumerate() {
        writeln!(
            out,
            "{}. {:<25} : {:>3} ({:>5.1}%)",
            i + 1,
            c.category,
            c.count,
            c.share * 100.0
        )?;
    }

    section(out, "TOP ISSUE REPORTERS")?;
    for (i, r) in agg.top_reporters.iter().take(5).enumerate() {
        writeln!(out, "{}. {:<35} : {:>3} issues", i + 1, r.reporter, r.count)?;
    }

    section(out, "SUPPORT STAFF PERFORMANCE")?;
    for p in agg.staff.iter().take(10) {
        writeln!(out, "* {}", p.staff)?;
        writeln!(
            out,
            "  Issues responded: {:>3} | Resolved: {:>3} | Mean response: {:.1} min | Messages: {:>3}",
            p.issues_responded, p.issues_resolved, p.mean_response_minutes, p.messages_sent
        )?;
    }

    section(out, "TIMING ANALYSIS")?;
    writeln!(out, "Response time distribution:")?;
    for b in &agg.response_times.buckets {
        writeln!(out, "  {:<18} : {:>3} issues", b.label, b.count)?;
    }
    if !agg.peak_hours.ranking.is_empty() {
        writeln!(out)?;
        writeln!(out, "Peak issue hours:")?;
        for h in agg.peak_hours.ranking.iter().take(3) {
            writeln!(
                out,
                "  {:02}:00 - {:02}:00 : {:>3} issues",
                h.hour,
                (h.hour + 1) % 24,
                h.count
            )?;
        }
    }

    writeln!(out)?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))
}

/// Render the full text report.
pub fn render_report(agg: &Aggregates, ctx: &ReportContext) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, agg, ctx);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::aggregate;

    #[test]
    fn test_empty_report_renders_zeroes() {
        let agg = aggregate(&[], &[], 3);
        let text = render_report(&agg, &ReportContext::default());
        assert!(text.contains("Total issues identified    : 0"));
        assert!(text.contains("Records skipped            : 3"));
        assert!(text.contains("Resolution rate            : 0.0%"));
        assert!(text.contains("Avg first response time    : n/a"));
        assert!(!text.contains("Peak issue hours"));
    }

    #[test]
    fn test_report_lists_buckets() {
        let agg = aggregate(&[], &[], 0);
        let text = render_report(&agg, &ReportContext::default());
        assert!(text.contains("Under 5 minutes"));
        assert!(text.contains("Over 1 hour"));
    }
}
