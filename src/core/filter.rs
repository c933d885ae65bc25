// SupportLens - core/filter.rs
//
// Composable filter over extracted issues.
// All active filters are AND-combined.
// Core layer: pure logic, no I/O.

use crate::core::model::{Issue, IssueStatus};
use crate::util::error::FilterError;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Complete filter state. All fields are AND-combined when applied.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    /// Statuses to include (empty = all).
    pub statuses: HashSet<IssueStatus>,

    /// Categories to include, lowercased (empty = all).
    pub categories: HashSet<String>,

    /// Reporters to include, lowercased (empty = all).
    pub reporters: HashSet<String>,

    /// First report date included. None = no lower bound.
    pub date_from: Option<NaiveDate>,

    /// Last report date included. None = no upper bound.
    pub date_to: Option<NaiveDate>,
}

/// Parse a `YYYY-MM-DD` date bound.
pub fn parse_date(value: &str) -> Result<NaiveDate, FilterError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| FilterError::InvalidDate {
        value: value.to_string(),
        source: e,
    })
}

impl IssueFilter {
    /// Returns true if no filters are active.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
            && self.categories.is_empty()
            && self.reporters.is_empty()
            && self.date_from.is_none()
            && self.date_to.is_none()
    }

    /// Add statuses by name (`resolved`, `pending`, `no-response`).
    pub fn add_statuses<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), FilterError> {
        for name in names {
            let status =
                IssueStatus::from_label(name.as_ref()).ok_or_else(|| FilterError::UnknownStatus {
                    value: name.as_ref().to_string(),
                })?;
            self.statuses.insert(status);
        }
        Ok(())
    }

    pub fn add_categories<S: AsRef<str>>(&mut self, names: &[S]) {
        self.categories
            .extend(names.iter().map(|n| n.as_ref().trim().to_lowercase()));
    }

    pub fn add_reporters<S: AsRef<str>>(&mut self, names: &[S]) {
        self.reporters
            .extend(names.iter().map(|n| n.as_ref().trim().to_lowercase()));
    }

    /// Set the inclusive report-date range from optional `YYYY-MM-DD` text.
    pub fn set_date_range(&mut self, from: Option<&str>, to: Option<&str>) -> Result<(), FilterError> {
        let from_date = from.map(parse_date).transpose()?;
        let to_date = to.map(parse_date).transpose()?;
        if let (Some(f), Some(t)) = (from_date, to_date) {
            if t < f {
                return Err(FilterError::InvertedRange {
                    from: f.to_string(),
                    to: t.to_string(),
                });
            }
        }
        self.date_from = from_date;
        self.date_to = to_date;
        Ok(())
    }
}

/// Apply filters to a slice of issues, returning indices of matching issues.
pub fn apply_filters(issues: &[Issue], filter: &IssueFilter) -> Vec<usize> {
    if filter.is_empty() {
        return (0..issues.len()).collect();
    }

    issues
        .iter()
        .enumerate()
        .filter(|(_, issue)| matches_all(issue, filter))
        .map(|(idx, _)| idx)
        .collect()
}

/// Clone the issues at `indices`, preserving their order.
pub fn select(issues: &[Issue], indices: &[usize]) -> Vec<Issue> {
    indices
        .iter()
        .filter_map(|&idx| issues.get(idx).cloned())
        .collect()
}

/// Check if a single issue matches all active filters.
fn matches_all(issue: &Issue, filter: &IssueFilter) -> bool {
    if !filter.statuses.is_empty() && !filter.statuses.contains(&issue.status) {
        return false;
    }

    if !filter.categories.is_empty() && !filter.categories.contains(&issue.category.to_lowercase()) {
        return false;
    }

    if !filter.reporters.is_empty()
        && !filter.reporters.contains(&issue.reporter.trim().to_lowercase())
    {
        return false;
    }

    let date = issue.reported_at.date();
    if filter.date_from.is_some_and(|from| date < from) {
        return false;
    }
    if filter.date_to.is_some_and(|to| date > to) {
        return false;
    }

    true
}
