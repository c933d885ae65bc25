// SupportLens - core/extract.rs
//
// The extraction pass: normalise timestamps, classify every message, and
// group messages into issues with response and resolution timing.
//
// Core layer: the whole pass is a pure function of its inputs. Classifier
// rules, roster and grouping behaviour are explicit parameters.

use crate::core::classifier::classify;
use crate::core::model::{Issue, IssueStatus, Language, Message, MessageTag, RawRecord};
use crate::core::parser::parse_timestamp;
use crate::core::roster::Roster;
use crate::core::rules::RuleSet;
use crate::util::constants;
use crate::util::error::RecordError;
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// Grouping policy
// =============================================================================

/// Decides which open issues a new report closes.
pub trait GroupingPolicy: fmt::Debug {
    fn name(&self) -> &'static str;

    /// True when `report` supersedes `open`, which is then finalised as
    /// abandoned before the new issue opens.
    fn supersedes(&self, open: &OpenIssue, report: &Message) -> bool;
}

/// One open issue per reporter: a new report from the same sender closes
/// that sender's previous issue. Other senders' issues are untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerSender;

impl GroupingPolicy for PerSender {
    fn name(&self) -> &'static str {
        "per-sender"
    }

    fn supersedes(&self, open: &OpenIssue, report: &Message) -> bool {
        open.is_reported_by(&report.sender)
    }
}

/// One open issue for the whole chat: any new report closes it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Single;

impl GroupingPolicy for Single {
    fn name(&self) -> &'static str {
        "single"
    }

    fn supersedes(&self, _open: &OpenIssue, _report: &Message) -> bool {
        true
    }
}

/// Reports never close other issues; issues end only by resolution or at
/// the end of the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct Concurrent;

impl GroupingPolicy for Concurrent {
    fn name(&self) -> &'static str {
        "concurrent"
    }

    fn supersedes(&self, _open: &OpenIssue, _report: &Message) -> bool {
        false
    }
}

/// Configuration-facing policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    #[default]
    PerSender,
    Single,
    Concurrent,
}

impl PolicyKind {
    pub fn policy(&self) -> Box<dyn GroupingPolicy> {
        match self {
            PolicyKind::PerSender => Box::new(PerSender),
            PolicyKind::Single => Box::new(Single),
            PolicyKind::Concurrent => Box::new(Concurrent),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PolicyKind::PerSender => "per-sender",
            PolicyKind::Single => "single",
            PolicyKind::Concurrent => "concurrent",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "per-sender" | "per_sender" => Some(PolicyKind::PerSender),
            "single" => Some(PolicyKind::Single),
            "concurrent" => Some(PolicyKind::Concurrent),
            _ => None,
        }
    }
}

/// Which open issue an unlinked staff message attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackTarget {
    /// The most recently opened issue.
    #[default]
    MostRecent,
    /// The longest-waiting issue.
    Oldest,
}

impl FallbackTarget {
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "most-recent" | "most_recent" => Some(FallbackTarget::MostRecent),
            "oldest" => Some(FallbackTarget::Oldest),
            _ => None,
        }
    }
}

/// Grouping configuration for one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct ExtractConfig {
    pub policy: PolicyKind,
    pub fallback: FallbackTarget,
    /// When set, the fallback only considers issues active within this
    /// many minutes of the staff message.
    pub attach_window_minutes: Option<i64>,
    /// Cap on the detailed skipped-record list.
    pub max_tracked_errors: usize,
}

impl ExtractConfig {
    pub fn new(policy: PolicyKind) -> Self {
        Self {
            policy,
            max_tracked_errors: constants::MAX_TRACKED_RECORD_ERRORS,
            ..Self::default()
        }
    }
}

// =============================================================================
// Issue builder
// =============================================================================

/// Mutable state of an issue while the pass runs. Frozen into `Issue`.
#[derive(Debug, Clone)]
pub struct OpenIssue {
    seq: usize,
    reporter: String,
    reporter_key: String,
    category: String,
    initial_message: String,
    language: Language,
    reported_at: NaiveDateTime,
    first_response_at: Option<NaiveDateTime>,
    resolved_at: Option<NaiveDateTime>,
    last_activity_at: NaiveDateTime,
    final_message: String,
    responder: Option<String>,
    resolver: Option<String>,
    participants: BTreeSet<String>,
    ticket_ids: Vec<String>,
    response_count: usize,
    message_count: usize,
}

impl OpenIssue {
    fn open(seq: usize, report: &Message, category: &str) -> Self {
        Self {
            seq,
            reporter: report.sender.clone(),
            reporter_key: report.sender.trim().to_lowercase(),
            category: category.to_string(),
            initial_message: report.body.clone(),
            language: report.language,
            reported_at: report.timestamp,
            first_response_at: None,
            resolved_at: None,
            last_activity_at: report.timestamp,
            final_message: report.body.clone(),
            responder: None,
            resolver: None,
            participants: BTreeSet::new(),
            ticket_ids: report.ticket_ids.clone(),
            response_count: 0,
            message_count: 1,
        }
    }

    pub fn is_reported_by(&self, sender: &str) -> bool {
        self.reporter_key == sender.trim().to_lowercase()
    }

    fn shares_ticket(&self, ticket_ids: &[String]) -> bool {
        ticket_ids.iter().any(|t| self.ticket_ids.contains(t))
    }

    /// The reporter is named in `body_lower` as `@name` or as the name,
    /// matched as a whole word. Names shorter than three chars are too
    /// ambiguous to match bare.
    fn is_mentioned(&self, body_lower: &str) -> bool {
        if self.reporter_key.is_empty() {
            return false;
        }
        if contains_word(body_lower, &format!("@{}", self.reporter_key)) {
            return true;
        }
        // Phone-number senders are tagged by digits only ("@9647701234567").
        let digits: String = self.reporter_key.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() >= 7 && contains_word(body_lower, &format!("@{digits}")) {
            return true;
        }
        self.reporter_key.chars().count() >= 3 && contains_word(body_lower, &self.reporter_key)
    }

    fn touch(&mut self, msg: &Message) {
        self.message_count += 1;
        self.last_activity_at = msg.timestamp;
        self.final_message = msg.body.clone();
        for t in &msg.ticket_ids {
            if !self.ticket_ids.contains(t) {
                self.ticket_ids.push(t.clone());
            }
        }
    }

    fn attach_staff(&mut self, msg: &Message) {
        self.touch(msg);
        self.response_count += 1;
        self.participants.insert(msg.sender.clone());
        if self.first_response_at.is_none() {
            self.first_response_at = Some(msg.timestamp);
            self.responder = Some(msg.sender.clone());
        }
    }

    fn freeze(self) -> Issue {
        let status = if self.resolved_at.is_some() {
            IssueStatus::Resolved
        } else if self.first_response_at.is_some() {
            IssueStatus::Pending
        } else {
            IssueStatus::NoResponse
        };
        Issue {
            id: format!("{}{:04}", constants::ISSUE_ID_PREFIX, self.seq + 1),
            category: self.category,
            reporter: self.reporter,
            initial_message: self.initial_message,
            language: self.language,
            reported_at: self.reported_at,
            first_response_at: self.first_response_at,
            resolved_at: self.resolved_at,
            last_activity_at: self.last_activity_at,
            final_message: self.final_message,
            status,
            responder: self.responder,
            resolver: self.resolver,
            participants: self.participants.into_iter().collect(),
            ticket_ids: self.ticket_ids,
            response_count: self.response_count,
            message_count: self.message_count,
        }
    }
}

/// True when `word` occurs in `haystack` with no letter or digit directly
/// before or after it. `"sam"` is in `"ok sam, done"` but not in `"same"`.
fn contains_word(haystack: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

// =============================================================================
// Extraction pass
// =============================================================================

/// Output of one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// Classified messages in chronological order.
    pub messages: Vec<Message>,
    /// Issues in report order.
    pub issues: Vec<Issue>,
    /// Records dropped because their timestamp could not be parsed.
    pub skipped_count: usize,
    /// Detail for the first `max_tracked_errors` skipped records.
    pub skipped: Vec<RecordError>,
}

/// Run the extraction pass over `records`.
///
/// Never fails: a record with an unparseable timestamp is skipped and
/// counted, and an empty input yields an empty result.
pub fn extract(
    records: &[RawRecord],
    rules: &RuleSet,
    roster: &Roster,
    config: &ExtractConfig,
) -> ExtractionResult {
    let mut result = ExtractionResult::default();

    let mut timed: Vec<(NaiveDateTime, &RawRecord)> = Vec::with_capacity(records.len());
    for record in records {
        match parse_timestamp(&record.timestamp, &rules.timestamp_formats) {
            Some(ts) => timed.push((ts, record)),
            None => {
                result.skipped_count += 1;
                if result.skipped.len() < config.max_tracked_errors {
                    result.skipped.push(RecordError::TimestampParse {
                        line_number: record.line_number,
                        raw_timestamp: record.timestamp.clone(),
                    });
                }
            }
        }
    }
    // Stable: equal timestamps keep input order.
    timed.sort_by_key(|(ts, _)| *ts);

    result.messages = timed
        .into_iter()
        .enumerate()
        .map(|(idx, (timestamp, record))| {
            let role = roster.role_of(&record.sender);
            let c = classify(&record.body, role, rules);
            Message {
                id: idx as u64,
                timestamp,
                sender: record.sender.clone(),
                role,
                body: record.body.clone(),
                tag: c.tag,
                language: c.language,
                ticket_ids: c.ticket_ids,
                source_line: record.line_number,
            }
        })
        .collect();

    result.issues = group(&result.messages, rules, config);

    if result.skipped_count > 0 {
        tracing::warn!(
            skipped = result.skipped_count,
            "Records skipped: timestamp matched no configured format"
        );
    }
    tracing::info!(
        messages = result.messages.len(),
        issues = result.issues.len(),
        policy = config.policy.label(),
        "Extraction complete"
    );

    result
}

/// The grouping pass over classified, chronologically ordered messages.
fn group(messages: &[Message], rules: &RuleSet, config: &ExtractConfig) -> Vec<Issue> {
    let policy = config.policy.policy();
    let window = config.attach_window_minutes.map(TimeDelta::minutes);

    // Open issues in the order they were opened.
    let mut open: Vec<OpenIssue> = Vec::new();
    let mut closed: Vec<OpenIssue> = Vec::new();
    let mut next_seq = 0usize;

    for msg in messages {
        match msg.tag {
            MessageTag::IssueReport => {
                let (superseded, kept): (Vec<_>, Vec<_>) = open
                    .into_iter()
                    .partition(|issue| policy.supersedes(issue, msg));
                for issue in &superseded {
                    tracing::debug!(
                        issue_seq = issue.seq,
                        reporter = %issue.reporter,
                        policy = policy.name(),
                        line = msg.source_line,
                        "Issue superseded by new report"
                    );
                }
                closed.extend(superseded);
                open = kept;

                let category = rules.category_for(&msg.body);
                open.push(OpenIssue::open(next_seq, msg, category));
                next_seq += 1;
            }
            MessageTag::SupportResponse => {
                if let Some(idx) = find_target(&open, msg, config.fallback, window) {
                    open[idx].attach_staff(msg);
                }
            }
            MessageTag::ResolutionConfirmation => {
                if let Some(idx) = find_target(&open, msg, config.fallback, window) {
                    let mut issue = open.remove(idx);
                    issue.attach_staff(msg);
                    issue.resolved_at = Some(msg.timestamp);
                    issue.resolver = Some(msg.sender.clone());
                    closed.push(issue);
                }
            }
            MessageTag::Unclassified => {
                if let Some(issue) = open.iter_mut().rev().find(|i| i.is_reported_by(&msg.sender)) {
                    issue.touch(msg);
                }
            }
        }
    }

    closed.extend(open);
    closed.sort_by_key(|issue| issue.seq);
    closed.into_iter().map(OpenIssue::freeze).collect()
}

/// Pick the open issue a staff message belongs to: shared ticket ID first,
/// then a mention of the reporter, then the fallback within the window.
/// Each step prefers the most recently opened match.
fn find_target(
    open: &[OpenIssue],
    msg: &Message,
    fallback: FallbackTarget,
    window: Option<TimeDelta>,
) -> Option<usize> {
    if !msg.ticket_ids.is_empty() {
        if let Some(idx) = open.iter().rposition(|i| i.shares_ticket(&msg.ticket_ids)) {
            return Some(idx);
        }
    }

    let body_lower = msg.body.to_lowercase();
    if let Some(idx) = open.iter().rposition(|i| i.is_mentioned(&body_lower)) {
        return Some(idx);
    }

    let in_window = |i: &OpenIssue| match window {
        Some(w) => msg.timestamp - i.last_activity_at <= w,
        None => true,
    };
    match fallback {
        FallbackTarget::MostRecent => open.iter().rposition(in_window),
        FallbackTarget::Oldest => open.iter().position(in_window),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::SenderRole;
    use crate::core::rules::load_builtin_rules;

    fn roster() -> Roster {
        let mut r = Roster::new();
        for c in ["userA", "userB", "userC"] {
            r.insert(c, SenderRole::Customer);
        }
        for s in ["staff1", "staff2"] {
            r.insert(s, SenderRole::Support);
        }
        r
    }

    fn rec(line: u64, ts: &str, sender: &str, body: &str) -> RawRecord {
        RawRecord {
            line_number: line,
            timestamp: ts.to_string(),
            sender: sender.to_string(),
            body: body.to_string(),
        }
    }

    fn run(records: &[RawRecord], config: &ExtractConfig) -> ExtractionResult {
        let rules = load_builtin_rules().unwrap();
        extract(records, &rules, &roster(), config)
    }

    fn default_run(records: &[RawRecord]) -> ExtractionResult {
        run(records, &ExtractConfig::new(PolicyKind::PerSender))
    }

    fn assert_invariants(issues: &[Issue]) {
        for issue in issues {
            if let Some(first) = issue.first_response_at {
                assert!(issue.reported_at <= first, "{}: response before report", issue.id);
                if let Some(resolved) = issue.resolved_at {
                    assert!(first <= resolved, "{}: resolution before response", issue.id);
                }
            }
            assert_eq!(
                issue.status == IssueStatus::Resolved,
                issue.resolved_at.is_some(),
                "{}",
                issue.id
            );
            assert_eq!(
                issue.status == IssueStatus::NoResponse,
                issue.first_response_at.is_none(),
                "{}",
                issue.id
            );
        }
    }

    #[test]
    fn test_resolved_port_down() {
        let result = default_run(&[
            rec(1, "2024-01-15 09:00:00", "userA", "port is down"),
            rec(2, "2024-01-15 09:04:00", "staff1", "checking now"),
            rec(3, "2024-01-15 10:00:00", "staff1", "fixed, resolved"),
        ]);
        assert_eq!(result.issues.len(), 1);
        let issue = &result.issues[0];
        assert_eq!(issue.id, "ISSUE_0001");
        assert_eq!(issue.category, "connectivity");
        assert_eq!(issue.status, IssueStatus::Resolved);
        assert_eq!(issue.response_time(), Some(TimeDelta::minutes(4)));
        assert_eq!(issue.resolution_time(), Some(TimeDelta::minutes(60)));
        assert_eq!(issue.responder.as_deref(), Some("staff1"));
        assert_eq!(issue.resolver.as_deref(), Some("staff1"));
        assert_eq!(issue.participants, vec!["staff1".to_string()]);
        assert_eq!(issue.response_count, 2);
        assert_eq!(issue.message_count, 3);
        assert_eq!(issue.final_message, "fixed, resolved");
        assert_invariants(&result.issues);
    }

    #[test]
    fn test_lone_report_is_no_response() {
        let result = default_run(&[rec(1, "2024-01-15 09:00:00", "userA", "issue report")]);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].status, IssueStatus::NoResponse);
        assert_eq!(result.issues[0].response_time(), None);
        assert_invariants(&result.issues);
    }

    #[test]
    fn test_empty_input_yields_empty_result() {
        let result = default_run(&[]);
        assert!(result.messages.is_empty());
        assert!(result.issues.is_empty());
        assert_eq!(result.skipped_count, 0);
    }

    #[test]
    fn test_interleaved_reporters_by_mention() {
        let result = default_run(&[
            rec(1, "2024-01-15 09:00:00", "userA", "port 1 down"),
            rec(2, "2024-01-15 09:01:00", "userB", "zabbix problem"),
            rec(3, "2024-01-15 09:05:00", "staff1", "@userB checking"),
            rec(4, "2024-01-15 09:10:00", "staff2", "@userA ok on it"),
            rec(5, "2024-01-15 09:20:00", "staff2", "userA fixed"),
            rec(6, "2024-01-15 09:30:00", "staff1", "@userB done"),
        ]);
        assert_eq!(result.issues.len(), 2);
        let a = &result.issues[0];
        let b = &result.issues[1];
        assert_eq!(a.reporter, "userA");
        assert_eq!(a.response_time(), Some(TimeDelta::minutes(10)));
        assert_eq!(a.resolution_time(), Some(TimeDelta::minutes(20)));
        assert_eq!(a.responder.as_deref(), Some("staff2"));
        assert_eq!(b.reporter, "userB");
        assert_eq!(b.category, "monitoring-alert");
        assert_eq!(b.response_time(), Some(TimeDelta::minutes(4)));
        assert_eq!(b.resolution_time(), Some(TimeDelta::minutes(29)));
        assert_eq!(b.responder.as_deref(), Some("staff1"));
        assert_invariants(&result.issues);
    }

    #[test]
    fn test_bare_name_inside_other_word_is_not_a_mention() {
        let result = default_run(&[
            rec(1, "2024-01-15 09:00:00", "Sam", "port down"),
            rec(2, "2024-01-15 09:01:00", "Bob", "link down"),
            rec(3, "2024-01-15 09:05:00", "staff1", "same here, checking"),
        ]);
        assert_eq!(result.issues.len(), 2);
        let (sam, bob) = (&result.issues[0], &result.issues[1]);
        assert_eq!(sam.status, IssueStatus::NoResponse);
        assert_eq!(bob.status, IssueStatus::Pending);
        assert_eq!(bob.responder.as_deref(), Some("staff1"));
    }

    #[test]
    fn test_bare_name_as_whole_word_is_a_mention() {
        let result = default_run(&[
            rec(1, "2024-01-15 09:00:00", "Sam", "port down"),
            rec(2, "2024-01-15 09:01:00", "Bob", "link down"),
            rec(3, "2024-01-15 09:05:00", "staff1", "Sam, checking"),
        ]);
        assert_eq!(result.issues[0].status, IssueStatus::Pending);
        assert_eq!(result.issues[1].status, IssueStatus::NoResponse);
    }

    #[test]
    fn test_contains_word_boundaries() {
        assert!(contains_word("ok sam, done", "sam"));
        assert!(contains_word("@sam", "@sam"));
        assert!(!contains_word("samsung router", "sam"));
        assert!(!contains_word("@samuel checking", "@sam"));
        assert!(contains_word("تم احمد", "احمد"));
        assert!(!contains_word("", "sam"));
    }

    #[test]
    fn test_staff_request_answers_then_thanks_resolves() {
        let result = default_run(&[
            rec(1, "2024-01-15 09:00:00", "userA", "port down"),
            rec(2, "2024-01-15 09:04:00", "staff1", "can you send a photo please"),
        ]);
        let issue = &result.issues[0];
        assert_eq!(issue.status, IssueStatus::Pending);
        assert_eq!(issue.responder.as_deref(), Some("staff1"));

        let result = default_run(&[
            rec(1, "2024-01-15 09:00:00", "userA", "port down"),
            rec(2, "2024-01-15 09:04:00", "staff1", "can you send a photo please"),
            rec(3, "2024-01-15 09:30:00", "staff1", "thanks, all good"),
        ]);
        assert_eq!(result.issues[0].status, IssueStatus::Resolved);
    }

    #[test]
    fn test_targeting_by_ticket_id() {
        let result = default_run(&[
            rec(1, "2024-01-15 09:00:00", "userA", "ticket 1111111 link down"),
            rec(2, "2024-01-15 09:01:00", "userB", "ticket 2222222 offline"),
            rec(3, "2024-01-15 09:02:00", "staff1", "1111111 done"),
        ]);
        assert_eq!(result.issues[0].status, IssueStatus::Resolved);
        assert_eq!(result.issues[1].status, IssueStatus::NoResponse);
        // Resolution without an earlier reply counts as the first response.
        assert_eq!(result.issues[0].first_response_at, result.issues[0].resolved_at);
        assert_invariants(&result.issues);
    }

    #[test]
    fn test_fallback_most_recent_and_oldest() {
        let records = [
            rec(1, "2024-01-15 09:00:00", "userA", "port down"),
            rec(2, "2024-01-15 09:01:00", "userB", "link down"),
            rec(3, "2024-01-15 09:02:00", "staff1", "checking"),
        ];
        let recent = default_run(&records);
        assert_eq!(recent.issues[0].status, IssueStatus::NoResponse);
        assert_eq!(recent.issues[1].status, IssueStatus::Pending);

        let config = ExtractConfig {
            fallback: FallbackTarget::Oldest,
            ..ExtractConfig::new(PolicyKind::PerSender)
        };
        let oldest = run(&records, &config);
        assert_eq!(oldest.issues[0].status, IssueStatus::Pending);
        assert_eq!(oldest.issues[1].status, IssueStatus::NoResponse);
    }

    #[test]
    fn test_attach_window_limits_fallback_only() {
        let records = [
            rec(1, "2024-01-15 09:00:00", "userA", "port down"),
            rec(2, "2024-01-15 13:00:00", "staff1", "checking"),
            rec(3, "2024-01-15 13:05:00", "staff1", "@userA checking again"),
        ];
        let config = ExtractConfig {
            attach_window_minutes: Some(60),
            ..ExtractConfig::new(PolicyKind::PerSender)
        };
        let result = run(&records, &config);
        let issue = &result.issues[0];
        // The unlinked reply is outside the window; the mention is not.
        assert_eq!(issue.response_count, 1);
        assert_eq!(
            issue.response_time(),
            Some(TimeDelta::hours(4) + TimeDelta::minutes(5))
        );
    }

    #[test]
    fn test_per_sender_supersedes_same_reporter_only() {
        let result = default_run(&[
            rec(1, "2024-01-15 09:00:00", "userA", "port down"),
            rec(2, "2024-01-15 09:01:00", "userB", "link down"),
            rec(3, "2024-01-15 09:02:00", "staff1", "@userA checking"),
            rec(4, "2024-01-15 09:03:00", "userA", "another problem"),
            rec(5, "2024-01-15 09:04:00", "staff1", "@userB done"),
        ]);
        assert_eq!(result.issues.len(), 3);
        // userA's first issue was answered, then abandoned: pending.
        assert_eq!(result.issues[0].status, IssueStatus::Pending);
        assert_eq!(result.issues[1].status, IssueStatus::Resolved);
        assert_eq!(result.issues[2].status, IssueStatus::NoResponse);
        assert_eq!(result.issues[2].id, "ISSUE_0003");
        assert_invariants(&result.issues);
    }

    #[test]
    fn test_single_policy_closes_everything() {
        let config = ExtractConfig::new(PolicyKind::Single);
        let result = run(
            &[
                rec(1, "2024-01-15 09:00:00", "userA", "port down"),
                rec(2, "2024-01-15 09:01:00", "userB", "link down"),
                rec(3, "2024-01-15 09:02:00", "staff1", "@userA done"),
            ],
            &config,
        );
        // userA's issue was closed by userB's report, so the mention has
        // nothing to attach to and the reply falls back to userB.
        assert_eq!(result.issues[0].status, IssueStatus::NoResponse);
        assert_eq!(result.issues[1].status, IssueStatus::Resolved);
    }

    #[test]
    fn test_concurrent_policy_keeps_same_reporter_issues_open() {
        let config = ExtractConfig::new(PolicyKind::Concurrent);
        let result = run(
            &[
                rec(1, "2024-01-15 09:00:00", "userA", "port down"),
                rec(2, "2024-01-15 09:01:00", "userA", "trigger alarm too"),
                rec(3, "2024-01-15 09:02:00", "staff1", "done"),
                rec(4, "2024-01-15 09:03:00", "staff1", "done"),
            ],
            &config,
        );
        assert_eq!(result.issues.len(), 2);
        assert!(result.issues.iter().all(|i| i.status == IssueStatus::Resolved));
        assert_eq!(result.issues[1].category, "environmental");
    }

    #[test]
    fn test_unparseable_timestamp_skipped() {
        let good = [
            rec(1, "2024-01-15 09:00:00", "userA", "port is down"),
            rec(2, "2024-01-15 09:04:00", "staff1", "checking now"),
            rec(4, "2024-01-15 10:00:00", "staff1", "fixed, resolved"),
        ];
        let mut with_bad = good.to_vec();
        with_bad.insert(2, rec(3, "not a time", "userB", "random chatter"));

        let base = default_run(&good);
        let result = default_run(&with_bad);
        assert_eq!(result.messages.len(), base.messages.len());
        assert_eq!(result.skipped_count, 1);
        assert_eq!(result.skipped[0].line_number(), 3);
        assert_eq!(result.issues, base.issues);

        // Results are handed around by value; the skipped detail survives a clone.
        let copy = result.clone();
        assert_eq!(copy.skipped_count, 1);
        assert_eq!(copy.skipped[0].line_number(), 3);
    }

    #[test]
    fn test_out_of_order_input_is_sorted_stably() {
        let result = default_run(&[
            rec(1, "2024-01-15 09:05:00", "staff1", "checking"),
            rec(2, "2024-01-15 09:00:00", "userA", "port down"),
            rec(3, "2024-01-15 09:05:00", "staff1", "on it"),
        ]);
        let lines: Vec<u64> = result.messages.iter().map(|m| m.source_line).collect();
        assert_eq!(lines, vec![2, 1, 3]);
        assert_eq!(result.issues[0].response_count, 2);
    }

    #[test]
    fn test_reporter_follow_up_attaches() {
        let result = default_run(&[
            rec(1, "2024-01-15 09:00:00", "userA", "port down"),
            rec(2, "2024-01-15 09:02:00", "userA", "ticket 9563926 please"),
            rec(3, "2024-01-15 09:03:00", "userB", "thanks all"),
        ]);
        // A ticket number from a customer is itself a new report.
        assert_eq!(result.issues.len(), 2);

        let result = default_run(&[
            rec(1, "2024-01-15 09:00:00", "userA", "port down"),
            rec(2, "2024-01-15 09:02:00", "userA", "any update?"),
            rec(3, "2024-01-15 09:03:00", "userB", "thanks all"),
        ]);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].message_count, 2);
        assert_eq!(result.issues[0].final_message, "any update?");
        assert_eq!(result.issues[0].last_activity_at.format("%H:%M").to_string(), "09:02");
    }

    #[test]
    fn test_deterministic() {
        let records = [
            rec(1, "2024-01-15 09:00:00", "userA", "port down"),
            rec(2, "2024-01-15 09:01:00", "userB", "link down"),
            rec(3, "2024-01-15 09:02:00", "staff1", "checking"),
            rec(4, "2024-01-15 09:09:00", "staff2", "@userA done"),
        ];
        assert_eq!(default_run(&records).issues, default_run(&records).issues);
    }

    #[test]
    fn test_policy_labels() {
        for kind in [PolicyKind::PerSender, PolicyKind::Single, PolicyKind::Concurrent] {
            assert_eq!(PolicyKind::from_label(kind.label()), Some(kind));
            assert_eq!(kind.policy().name(), kind.label());
        }
        assert_eq!(PolicyKind::from_label("round-robin"), None);
    }
}
