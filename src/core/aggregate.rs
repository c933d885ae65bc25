// SupportLens - core/aggregate.rs
//
// KPI aggregation over extracted issues and messages.
// Core layer: pure, deterministic, no wall-clock access. Inputs are
// borrowed immutably.

use crate::core::model::{Issue, IssueStatus, Message, MessageTag, SenderRole, StaffPerformance};
use crate::util::constants;
use chrono::{Datelike, NaiveDate, Timelike};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Headline counts and rates. Rates are fractions in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub total_issues: usize,
    pub resolved: usize,
    pub pending: usize,
    pub no_response: usize,
    pub resolution_rate: f64,
    pub response_rate: f64,
    pub mean_response_minutes: Option<f64>,
    pub mean_resolution_hours: Option<f64>,
    pub total_messages: usize,
    pub skipped_records: usize,
    /// Distinct senders who are not support staff.
    pub customers: usize,
    /// Distinct support senders.
    pub support_staff: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
    /// Fraction of all issues.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketCount {
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseTimeStats {
    /// Response times in minutes, in issue order.
    pub values_minutes: Vec<f64>,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub buckets: Vec<BucketCount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FiveNumberSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionTimeStats {
    /// Resolution times in hours, in issue order.
    pub values_hours: Vec<f64>,
    pub mean: f64,
    pub summary: FiveNumberSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeakHours {
    /// Reports per hour of day, index = hour.
    pub by_hour: Vec<usize>,
    /// Hours with at least one report, busiest first.
    pub ranking: Vec<HourCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekdayCount {
    pub weekday: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReporterCount {
    pub reporter: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: MessageTag,
    pub count: usize,
}

/// Everything the reports and exports are built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregates {
    pub summary: KpiSummary,
    pub categories: Vec<CategoryCount>,
    pub response_times: ResponseTimeStats,
    /// `None` when no issue was resolved.
    pub resolution_times: Option<ResolutionTimeStats>,
    pub peak_hours: PeakHours,
    pub daily_trend: Vec<DailyCount>,
    pub weekdays: Vec<WeekdayCount>,
    pub top_reporters: Vec<ReporterCount>,
    pub staff: Vec<StaffPerformance>,
    pub tag_counts: Vec<TagCount>,
}

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Compute all aggregates.
pub fn aggregate(issues: &[Issue], messages: &[Message], skipped_records: usize) -> Aggregates {
    let response_times = response_time_stats(issues);
    let resolution_times = resolution_time_stats(issues);
    Aggregates {
        summary: summary(issues, messages, skipped_records, &response_times, &resolution_times),
        categories: category_breakdown(issues),
        response_times,
        resolution_times,
        peak_hours: peak_hours(issues),
        daily_trend: daily_trend(issues),
        weekdays: weekday_distribution(issues),
        top_reporters: top_reporters(issues, constants::TOP_REPORTERS_LIMIT),
        staff: staff_performance(issues, messages),
        tag_counts: tag_counts(messages),
    }
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn summary(
    issues: &[Issue],
    messages: &[Message],
    skipped_records: usize,
    response_times: &ResponseTimeStats,
    resolution_times: &Option<ResolutionTimeStats>,
) -> KpiSummary {
    let count = |status: IssueStatus| issues.iter().filter(|i| i.status == status).count();
    let total = issues.len();
    let resolved = count(IssueStatus::Resolved);
    let responded = issues.iter().filter(|i| i.first_response_at.is_some()).count();

    let mut customers = BTreeSet::new();
    let mut staff = BTreeSet::new();
    for m in messages {
        if m.role == SenderRole::Support {
            staff.insert(m.sender.as_str());
        } else {
            customers.insert(m.sender.as_str());
        }
    }

    KpiSummary {
        total_issues: total,
        resolved,
        pending: count(IssueStatus::Pending),
        no_response: count(IssueStatus::NoResponse),
        resolution_rate: rate(resolved, total),
        response_rate: rate(responded, total),
        mean_response_minutes: response_times.mean,
        mean_resolution_hours: resolution_times.as_ref().map(|r| r.mean),
        total_messages: messages.len(),
        skipped_records,
        customers: customers.len(),
        support_staff: staff.len(),
    }
}

/// Issue counts per category, descending count then name.
pub fn category_breakdown(issues: &[Issue]) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for issue in issues {
        *counts.entry(issue.category.as_str()).or_default() += 1;
    }
    // BTreeMap iterates by name, so a stable sort on count keeps name order
    // among ties.
    let mut out: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
            share: rate(count, issues.len()),
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

fn bucket_index(minutes: f64) -> usize {
    constants::RESPONSE_BUCKET_EDGES_MINUTES
        .iter()
        .position(|edge| minutes < *edge)
        .unwrap_or(constants::RESPONSE_BUCKET_EDGES_MINUTES.len())
}

pub fn response_time_stats(issues: &[Issue]) -> ResponseTimeStats {
    let values: Vec<f64> = issues.iter().filter_map(Issue::response_minutes).collect();

    let mut counts = vec![0usize; constants::RESPONSE_BUCKET_LABELS.len()];
    for v in &values {
        counts[bucket_index(*v)] += 1;
    }

    ResponseTimeStats {
        mean: mean(&values),
        min: values.iter().copied().reduce(f64::min),
        max: values.iter().copied().reduce(f64::max),
        buckets: constants::RESPONSE_BUCKET_LABELS
            .iter()
            .zip(counts)
            .map(|(&label, count)| BucketCount { label, count })
            .collect(),
        values_minutes: values,
    }
}

/// Quantile of sorted values by linear interpolation between closest ranks.
/// `sorted` must be non-empty and ascending.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

pub fn resolution_time_stats(issues: &[Issue]) -> Option<ResolutionTimeStats> {
    let values: Vec<f64> = issues.iter().filter_map(Issue::resolution_hours).collect();
    let mean = mean(&values)?;

    let mut sorted = values.clone();
    sorted.sort_by(f64::total_cmp);
    let summary = FiveNumberSummary {
        min: sorted[0],
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    };

    Some(ResolutionTimeStats {
        values_hours: values,
        mean,
        summary,
    })
}

pub fn peak_hours(issues: &[Issue]) -> PeakHours {
    let mut by_hour = vec![0usize; 24];
    for issue in issues {
        by_hour[issue.reported_at.hour() as usize] += 1;
    }
    let mut ranking: Vec<HourCount> = by_hour
        .iter()
        .enumerate()
        .filter(|(_, c)| **c > 0)
        .map(|(hour, count)| HourCount {
            hour: hour as u32,
            count: *count,
        })
        .collect();
    ranking.sort_by(|a, b| b.count.cmp(&a.count).then(a.hour.cmp(&b.hour)));
    PeakHours { by_hour, ranking }
}

pub fn daily_trend(issues: &[Issue]) -> Vec<DailyCount> {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for issue in issues {
        *counts.entry(issue.reported_at.date()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect()
}

/// Reports per weekday, Monday first. All seven days are listed.
pub fn weekday_distribution(issues: &[Issue]) -> Vec<WeekdayCount> {
    let mut counts = [0usize; 7];
    for issue in issues {
        counts[issue.reported_at.weekday().num_days_from_monday() as usize] += 1;
    }
    WEEKDAY_NAMES
        .iter()
        .zip(counts)
        .map(|(&weekday, count)| WeekdayCount { weekday, count })
        .collect()
}

pub fn top_reporters(issues: &[Issue], limit: usize) -> Vec<ReporterCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for issue in issues {
        *counts.entry(issue.reporter.as_str()).or_default() += 1;
    }
    let mut out: Vec<ReporterCount> = counts
        .into_iter()
        .map(|(reporter, count)| ReporterCount {
            reporter: reporter.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out.truncate(limit);
    out
}

/// Per-responder performance, most issues responded first, ties by name.
pub fn staff_performance(issues: &[Issue], messages: &[Message]) -> Vec<StaffPerformance> {
    #[derive(Default)]
    struct Acc {
        responded: usize,
        resolved: usize,
        response_minutes: Vec<f64>,
    }

    let mut by_staff: BTreeMap<&str, Acc> = BTreeMap::new();
    for issue in issues {
        let Some(responder) = issue.responder.as_deref() else {
            continue;
        };
        let acc = by_staff.entry(responder).or_default();
        acc.responded += 1;
        if issue.status == IssueStatus::Resolved {
            acc.resolved += 1;
        }
        if let Some(m) = issue.response_minutes() {
            acc.response_minutes.push(m);
        }
    }

    let mut sent: BTreeMap<&str, usize> = BTreeMap::new();
    for m in messages {
        *sent.entry(m.sender.as_str()).or_default() += 1;
    }

    let mut out: Vec<StaffPerformance> = by_staff
        .into_iter()
        .map(|(staff, acc)| StaffPerformance {
            staff: staff.to_string(),
            issues_responded: acc.responded,
            issues_resolved: acc.resolved,
            mean_response_minutes: mean(&acc.response_minutes).unwrap_or(0.0),
            messages_sent: sent.get(staff).copied().unwrap_or(0),
        })
        .collect();
    out.sort_by(|a, b| b.issues_responded.cmp(&a.issues_responded));
    out
}

pub fn tag_counts(messages: &[Message]) -> Vec<TagCount> {
    MessageTag::all()
        .iter()
        .map(|tag| TagCount {
            tag: *tag,
            count: messages.iter().filter(|m| m.tag == *tag).count(),
        })
        .collect()
}
