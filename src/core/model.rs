// SupportLens - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// platform dependencies.
//
// These types are the shared vocabulary across all layers.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Raw record (output of input decoding)
// =============================================================================

/// One decoded row of the source log, before timestamp normalisation.
///
/// The parser emits these in file order. The timestamp is kept as text so
/// the extraction pass can skip (and count) rows whose timestamp matches
/// none of the configured formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Line number (text exports) or 1-based data row (CSV) in the source.
    pub line_number: u64,

    /// Timestamp text exactly as it appeared in the source.
    pub timestamp: String,

    /// Sender name or phone number.
    pub sender: String,

    /// Full message text, including continuation lines.
    pub body: String,
}

// =============================================================================
// Message
// =============================================================================

/// Classification tag for a single message.
///
/// Variant order is the tie-break precedence: when several rules match,
/// the greatest tag wins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum MessageTag {
    #[default]
    Unclassified,
    IssueReport,
    SupportResponse,
    ResolutionConfirmation,
}

impl MessageTag {
    /// Returns all variants in display order.
    pub fn all() -> &'static [MessageTag] {
        &[
            MessageTag::IssueReport,
            MessageTag::SupportResponse,
            MessageTag::ResolutionConfirmation,
            MessageTag::Unclassified,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            MessageTag::IssueReport => "issue-report",
            MessageTag::SupportResponse => "support-response",
            MessageTag::ResolutionConfirmation => "resolution-confirmation",
            MessageTag::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Role of a chat participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Customer,
    Support,
    #[default]
    Unknown,
}

impl SenderRole {
    pub fn label(&self) -> &'static str {
        match self {
            SenderRole::Customer => "customer",
            SenderRole::Support => "support",
            SenderRole::Unknown => "unknown",
        }
    }

    /// True for anyone who is not known support staff. Unknown senders can
    /// report issues but never answer them.
    pub fn is_reporter(&self) -> bool {
        !matches!(self, SenderRole::Support)
    }
}

/// Dominant script of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Arabic,
    English,
    #[default]
    Mixed,
}

impl Language {
    pub fn label(&self) -> &'static str {
        match self {
            Language::Arabic => "arabic",
            Language::English => "english",
            Language::Mixed => "mixed",
        }
    }
}

/// A classified message. Immutable once built by the extraction pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Position in the chronological message sequence (0-based).
    pub id: u64,
    pub timestamp: NaiveDateTime,
    pub sender: String,
    pub role: SenderRole,
    pub body: String,
    pub tag: MessageTag,
    pub language: Language,
    /// Ticket identifiers found in the body, in order of appearance.
    pub ticket_ids: Vec<String>,
    /// Line in the source file this message came from.
    pub source_line: u64,
}

// =============================================================================
// Issue
// =============================================================================

/// Final status of an issue after the extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueStatus {
    Resolved,
    Pending,
    NoResponse,
}

impl IssueStatus {
    pub fn all() -> &'static [IssueStatus] {
        &[
            IssueStatus::Resolved,
            IssueStatus::Pending,
            IssueStatus::NoResponse,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            IssueStatus::Resolved => "resolved",
            IssueStatus::Pending => "pending",
            IssueStatus::NoResponse => "no-response",
        }
    }

    /// Parse a status name as written on the command line. Accepts the
    /// underscore spelling used by older exports.
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "resolved" => Some(IssueStatus::Resolved),
            "pending" => Some(IssueStatus::Pending),
            "no-response" | "no_response" => Some(IssueStatus::NoResponse),
            _ => None,
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One customer-reported problem, tracked from report to resolution or
/// the end of the log.
///
/// Invariants (enforced by `core::extract`):
/// `reported_at <= first_response_at <= resolved_at` where present;
/// `status == Resolved` iff `resolved_at` is set;
/// `status == NoResponse` iff `first_response_at` is unset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// `ISSUE_0001`, `ISSUE_0002`, ... in report order.
    pub id: String,
    pub category: String,
    pub reporter: String,
    pub initial_message: String,
    pub language: Language,
    pub reported_at: NaiveDateTime,
    pub first_response_at: Option<NaiveDateTime>,
    pub resolved_at: Option<NaiveDateTime>,
    /// Timestamp of the last message attached to the issue.
    pub last_activity_at: NaiveDateTime,
    /// Body of the last message attached to the issue.
    pub final_message: String,
    pub status: IssueStatus,
    /// Staff member whose message was the first response.
    pub responder: Option<String>,
    /// Staff member who confirmed the resolution.
    pub resolver: Option<String>,
    /// Every staff member who posted on the issue, sorted.
    pub participants: Vec<String>,
    pub ticket_ids: Vec<String>,
    /// Staff messages attached to the issue.
    pub response_count: usize,
    /// All messages attached to the issue, the report included.
    pub message_count: usize,
}

impl Issue {
    /// First response minus report. `None` if never answered.
    pub fn response_time(&self) -> Option<TimeDelta> {
        self.first_response_at.map(|t| t - self.reported_at)
    }

    /// Resolution minus report. `None` if unresolved.
    pub fn resolution_time(&self) -> Option<TimeDelta> {
        self.resolved_at.map(|t| t - self.reported_at)
    }

    /// Response time in fractional minutes.
    pub fn response_minutes(&self) -> Option<f64> {
        self.response_time().map(minutes)
    }

    /// Resolution time in fractional hours.
    pub fn resolution_hours(&self) -> Option<f64> {
        self.resolution_time().map(|d| minutes(d) / 60.0)
    }
}

/// Convert a duration to fractional minutes.
pub fn minutes(d: TimeDelta) -> f64 {
    d.num_seconds() as f64 / 60.0
}

// =============================================================================
// Staff performance
// =============================================================================

/// Aggregate keyed by responding staff identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffPerformance {
    pub staff: String,
    /// Issues where this staff member gave the first response.
    pub issues_responded: usize,
    /// Of those, how many ended resolved.
    pub issues_resolved: usize,
    /// Mean response time over the issues responded, in minutes.
    pub mean_response_minutes: f64,
    /// Messages this staff member sent in the whole log.
    pub messages_sent: usize,
}
