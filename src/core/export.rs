// SupportLens - core/export.rs
//
// Tabular and JSON export of extraction results and aggregates.
// Core layer: builds tables in memory and writes to any Write trait
// object. Choosing file names and creating directories is the app layer's
// job.

use crate::core::aggregate::Aggregates;
use crate::core::model::{Issue, Message};
use crate::util::constants;
use crate::util::error::ExportError;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// One named table: headers plus string rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Display name ("KPI Summary").
    pub name: &'static str,
    /// File stem used by the CSV directory writer ("kpi_summary").
    pub file_stem: &'static str,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn new(name: &'static str, file_stem: &'static str, headers: &[&'static str]) -> Self {
        Self {
            name,
            file_stem,
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    fn push<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    fn push_kv(&mut self, section: &str, key: &str, value: String) {
        self.rows.push(vec![section.to_string(), key.to_string(), value]);
    }
}

/// All export tables in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workbook {
    pub tables: Vec<Table>,
}

impl Workbook {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Everything serialised into the JSON bundle.
#[derive(Debug, Serialize)]
pub struct ReportBundle<'a> {
    pub source: String,
    pub ruleset: &'a str,
    pub policy: &'a str,
    pub aggregates: &'a Aggregates,
    pub issues: &'a [Issue],
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format(constants::EXPORT_TIMESTAMP_FORMAT).to_string()
}

fn fmt_opt_ts(ts: Option<NaiveDateTime>) -> String {
    ts.map(fmt_ts).unwrap_or_default()
}

fn fmt_num(value: f64) -> String {
    format!("{value:.2}")
}

fn fmt_opt_num(value: Option<f64>) -> String {
    value.map(fmt_num).unwrap_or_default()
}

fn fmt_pct(fraction: f64) -> String {
    format!("{:.1}", fraction * 100.0)
}

/// Build every export table.
pub fn build_workbook(issues: &[Issue], messages: &[Message], agg: &Aggregates) -> Workbook {
    Workbook {
        tables: vec![
            issues_table(issues),
            messages_table(messages),
            kpi_table(agg),
            categories_table(agg),
            staff_table(agg),
            timing_table(agg),
        ],
    }
}

fn issues_table(issues: &[Issue]) -> Table {
    let mut t = Table::new(
        "Issues",
        "issues",
        &[
            "Issue ID",
            "Category",
            "Reporter",
            "Reported At",
            "First Response At",
            "Resolved At",
            "Status",
            "Responder",
            "Resolver",
            "Participants",
            "Ticket IDs",
            "Response Minutes",
            "Resolution Hours",
            "Responses",
            "Messages",
            "Language",
            "Initial Message",
            "Final Message",
        ],
    );
    for i in issues {
        t.push([
            i.id.clone(),
            i.category.clone(),
            i.reporter.clone(),
            fmt_ts(i.reported_at),
            fmt_opt_ts(i.first_response_at),
            fmt_opt_ts(i.resolved_at),
            i.status.label().to_string(),
            i.responder.clone().unwrap_or_default(),
            i.resolver.clone().unwrap_or_default(),
            i.participants.join("; "),
            i.ticket_ids.join("; "),
            fmt_opt_num(i.response_minutes()),
            fmt_opt_num(i.resolution_hours()),
            i.response_count.to_string(),
            i.message_count.to_string(),
            i.language.label().to_string(),
            clip(&i.initial_message, constants::EXPORT_ISSUE_TEXT_CHARS),
            clip(&i.final_message, constants::EXPORT_ISSUE_TEXT_CHARS),
        ]);
    }
    t
}

fn messages_table(messages: &[Message]) -> Table {
    let mut t = Table::new(
        "Messages",
        "messages",
        &[
            "Message ID",
            "Timestamp",
            "Sender",
            "Role",
            "Tag",
            "Language",
            "Ticket IDs",
            "Source Line",
            "Content",
        ],
    );
    for m in messages {
        t.push([
            m.id.to_string(),
            fmt_ts(m.timestamp),
            m.sender.clone(),
            m.role.label().to_string(),
            m.tag.label().to_string(),
            m.language.label().to_string(),
            m.ticket_ids.join("; "),
            m.source_line.to_string(),
            clip(&m.body, constants::EXPORT_MESSAGE_TEXT_CHARS),
        ]);
    }
    t
}

fn kpi_table(agg: &Aggregates) -> Table {
    let s = &agg.summary;
    let mut t = Table::new("KPI Summary", "kpi_summary", &["Metric", "Value"]);
    t.push(["Total Issues".to_string(), s.total_issues.to_string()]);
    t.push(["Resolved".to_string(), s.resolved.to_string()]);
    t.push(["Pending".to_string(), s.pending.to_string()]);
    t.push(["No Response".to_string(), s.no_response.to_string()]);
    t.push(["Resolution Rate (%)".to_string(), fmt_pct(s.resolution_rate)]);
    t.push(["Response Rate (%)".to_string(), fmt_pct(s.response_rate)]);
    t.push([
        "Mean Response Time (minutes)".to_string(),
        fmt_opt_num(s.mean_response_minutes),
    ]);
    t.push([
        "Mean Resolution Time (hours)".to_string(),
        fmt_opt_num(s.mean_resolution_hours),
    ]);
    t.push(["Total Messages".to_string(), s.total_messages.to_string()]);
    t.push(["Skipped Records".to_string(), s.skipped_records.to_string()]);
    t.push(["Customers".to_string(), s.customers.to_string()]);
    t.push(["Support Staff".to_string(), s.support_staff.to_string()]);
    for tc in &agg.tag_counts {
        t.push([format!("Messages: {}", tc.tag), tc.count.to_string()]);
    }
    t
}

fn categories_table(agg: &Aggregates) -> Table {
    let mut t = Table::new("Categories", "categories", &["Category", "Count", "Share (%)"]);
    for c in &agg.categories {
        t.push([c.category.clone(), c.count.to_string(), fmt_pct(c.share)]);
    }
    t
}

fn staff_table(agg: &Aggregates) -> Table {
    let mut t = Table::new(
        "Support Performance",
        "support_performance",
        &[
            "Staff",
            "Issues Responded",
            "Issues Resolved",
            "Resolution Rate (%)",
            "Mean Response (minutes)",
            "Messages Sent",
        ],
    );
    for p in &agg.staff {
        let rate = if p.issues_responded == 0 {
            0.0
        } else {
            p.issues_resolved as f64 / p.issues_responded as f64
        };
        t.push([
            p.staff.clone(),
            p.issues_responded.to_string(),
            p.issues_resolved.to_string(),
            fmt_pct(rate),
            fmt_num(p.mean_response_minutes),
            p.messages_sent.to_string(),
        ]);
    }
    t
}

/// Long-form timing table: one (section, key, value) row per figure.
fn timing_table(agg: &Aggregates) -> Table {
    let mut t = Table::new("Timing Analysis", "timing_analysis", &["Section", "Key", "Value"]);

    let rt = &agg.response_times;
    t.push_kv("Response Time (minutes)", "Mean", fmt_opt_num(rt.mean));
    t.push_kv("Response Time (minutes)", "Min", fmt_opt_num(rt.min));
    t.push_kv("Response Time (minutes)", "Max", fmt_opt_num(rt.max));
    for b in &rt.buckets {
        t.push_kv("Response Buckets", b.label, b.count.to_string());
    }

    if let Some(res) = &agg.resolution_times {
        let s = &res.summary;
        for (key, value) in [
            ("Mean", res.mean),
            ("Min", s.min),
            ("Q1", s.q1),
            ("Median", s.median),
            ("Q3", s.q3),
            ("Max", s.max),
        ] {
            t.push_kv("Resolution Time (hours)", key, fmt_num(value));
        }
    }

    for (hour, count) in agg.peak_hours.by_hour.iter().enumerate() {
        t.push_kv("Reports by Hour", &format!("{hour:02}:00"), count.to_string());
    }
    for d in &agg.daily_trend {
        t.push_kv("Daily Trend", &d.date.to_string(), d.count.to_string());
    }
    for w in &agg.weekdays {
        t.push_kv("Reports by Weekday", w.weekday, w.count.to_string());
    }
    t
}

/// Write one table as CSV. Returns the number of data rows written.
pub fn write_table_csv<W: Write>(
    table: &Table,
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let csv_err = |e| ExportError::Csv {
        path: export_path.to_path_buf(),
        source: e,
    };
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(&table.headers).map_err(csv_err)?;
    for row in &table.rows {
        csv_writer.write_record(row).map_err(csv_err)?;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;

    Ok(table.rows.len())
}

/// Write the JSON bundle.
pub fn export_json<W: Write>(
    bundle: &ReportBundle<'_>,
    writer: W,
    export_path: &Path,
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, bundle).map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::aggregate;
    use crate::core::extract::{extract, ExtractConfig, PolicyKind};
    use crate::core::model::{RawRecord, SenderRole};
    use crate::core::roster::Roster;
    use crate::core::rules::load_builtin_rules;
    use std::path::PathBuf;

    fn rec(line: u64, ts: &str, sender: &str, body: &str) -> RawRecord {
        RawRecord {
            line_number: line,
            timestamp: ts.to_string(),
            sender: sender.to_string(),
            body: body.to_string(),
        }
    }

    fn sample() -> (Vec<Issue>, Vec<Message>, Aggregates) {
        let rules = load_builtin_rules().unwrap();
        let mut roster = Roster::new();
        roster.insert("Ahmed", SenderRole::Customer);
        roster.insert("Omar", SenderRole::Support);
        let long = format!("port down {}", "x".repeat(500));
        let records = vec![
            rec(1, "2024-01-15 09:00:00", "Ahmed", &long),
            rec(2, "2024-01-15 09:04:00", "Omar", "checking, will update"),
            rec(3, "2024-01-15 10:00:00", "Omar", "fixed"),
        ];
        let result = extract(&records, &rules, &roster, &ExtractConfig::new(PolicyKind::PerSender));
        let agg = aggregate(&result.issues, &result.messages, result.skipped_count);
        (result.issues, result.messages, agg)
    }

    #[test]
    fn test_workbook_has_all_tables() {
        let (issues, messages, agg) = sample();
        let wb = build_workbook(&issues, &messages, &agg);
        let names: Vec<&str> = wb.tables.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "Issues",
                "Messages",
                "KPI Summary",
                "Categories",
                "Support Performance",
                "Timing Analysis"
            ]
        );
        for t in &wb.tables {
            for row in &t.rows {
                assert_eq!(row.len(), t.headers.len(), "ragged row in {}", t.name);
            }
        }
    }

    #[test]
    fn test_issue_row_format_and_clipping() {
        let (issues, messages, agg) = sample();
        let wb = build_workbook(&issues, &messages, &agg);
        let t = wb.table("Issues").unwrap();
        let row = &t.rows[0];
        assert_eq!(row[0], "ISSUE_0001");
        assert_eq!(row[3], "2024-01-15 09:00");
        assert_eq!(row[6], "resolved");
        assert_eq!(row[11], "4.00");
        assert_eq!(row[12], "1.00");
        assert_eq!(row[16].chars().count(), constants::EXPORT_ISSUE_TEXT_CHARS);

        let msgs = wb.table("Messages").unwrap();
        assert_eq!(msgs.rows[0][8].chars().count(), constants::EXPORT_MESSAGE_TEXT_CHARS);
    }

    #[test]
    fn test_kpi_rates_as_percent() {
        let (issues, messages, agg) = sample();
        let wb = build_workbook(&issues, &messages, &agg);
        let kpi = wb.table("KPI Summary").unwrap();
        let rate = kpi
            .rows
            .iter()
            .find(|r| r[0] == "Resolution Rate (%)")
            .unwrap();
        assert_eq!(rate[1], "100.0");
    }

    #[test]
    fn test_csv_quotes_embedded_commas() {
        let (issues, messages, agg) = sample();
        let wb = build_workbook(&issues, &messages, &agg);
        let mut buf = Vec::new();
        let count = write_table_csv(
            wb.table("Messages").unwrap(),
            &mut buf,
            &PathBuf::from("messages.csv"),
        )
        .unwrap();
        assert_eq!(count, 3);
        let output = String::from_utf8(buf).unwrap();
        assert!(output.starts_with("Message ID,Timestamp,Sender"));
        assert!(output.contains("\"checking, will update\""));
    }

    #[test]
    fn test_json_bundle() {
        let (issues, _, agg) = sample();
        let bundle = ReportBundle {
            source: "chat.txt".to_string(),
            ruleset: "builtin",
            policy: "per-sender",
            aggregates: &agg,
            issues: &issues,
        };
        let mut buf = Vec::new();
        export_json(&bundle, &mut buf, &PathBuf::from("report.json")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["aggregates"]["summary"]["total_issues"], 1);
        assert_eq!(value["issues"][0]["status"], "resolved");
        assert_eq!(value["policy"], "per-sender");
    }
}
