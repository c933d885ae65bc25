// SupportLens - core/roster.rs
//
// Member roster: who is a customer and who is support staff.
// Core layer: parses and renders JSON text, inference is pure.
//
// File format (shared with earlier tooling):
//   { "customers": ["Ahmed", ...], "support_staff": ["Omar Noc", ...] }

use crate::core::classifier::matched_tags;
use crate::core::model::{MessageTag, RawRecord, SenderRole};
use crate::core::parser::parse_timestamp;
use crate::core::rules::RuleSet;
use crate::util::constants;
use crate::util::error::RosterError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// On-disk roster shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterFile {
    #[serde(default)]
    pub customers: Vec<String>,
    #[serde(default)]
    pub support_staff: Vec<String>,
}

/// Sender-to-role lookup. Names match case-insensitively after trimming.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    /// Normalised name -> (display name, role).
    members: BTreeMap<String, (String, SenderRole)>,
}

fn normalise(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the file shape. A name listed as both customer and staff
    /// is treated as staff.
    pub fn from_file(file: RosterFile) -> Self {
        let mut roster = Self::new();
        for name in file.customers {
            roster.insert(&name, SenderRole::Customer);
        }
        for name in file.support_staff {
            roster.insert(&name, SenderRole::Support);
        }
        roster
    }

    pub fn insert(&mut self, name: &str, role: SenderRole) {
        let key = normalise(name);
        if key.is_empty() {
            return;
        }
        self.members.insert(key, (name.trim().to_string(), role));
    }

    /// Role of `sender`, `Unknown` when not listed.
    pub fn role_of(&self, sender: &str) -> SenderRole {
        self.members
            .get(&normalise(sender))
            .map(|(_, role)| *role)
            .unwrap_or(SenderRole::Unknown)
    }

    pub fn contains(&self, sender: &str) -> bool {
        self.members.contains_key(&normalise(sender))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Names with the given role, sorted by normalised name.
    pub fn names_with(&self, role: SenderRole) -> Vec<String> {
        self.members
            .values()
            .filter(|(_, r)| *r == role)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn to_file(&self) -> RosterFile {
        RosterFile {
            customers: self.names_with(SenderRole::Customer),
            support_staff: self.names_with(SenderRole::Support),
        }
    }
}

/// Parse roster JSON. `source_path` is used for error messages only.
pub fn parse_roster_json(content: &str, source_path: &Path) -> Result<Roster, RosterError> {
    let file: RosterFile = serde_json::from_str(content).map_err(|e| RosterError::Json {
        path: source_path.to_path_buf(),
        source: e,
    })?;
    let roster = Roster::from_file(file);
    tracing::debug!(
        path = %source_path.display(),
        members = roster.len(),
        "Roster parsed"
    );
    Ok(roster)
}

/// Render a roster as pretty JSON in the file format.
pub fn roster_to_json(roster: &Roster, dest_path: &Path) -> Result<String, RosterError> {
    serde_json::to_string_pretty(&roster.to_file()).map_err(|e| RosterError::Json {
        path: dest_path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, Default, Clone, Copy)]
struct RuleHits {
    reports: usize,
    responses: usize,
    resolutions: usize,
}

/// Return a copy of `roster` extended with a guessed role for every sender
/// in `records` it does not list.
///
/// A sender is a customer when their messages hit report rules more often
/// than response rules and hit resolution rules fewer than
/// `AUTO_CLASSIFY_MAX_CUSTOMER_RESOLUTIONS` times; anyone else is staff.
/// Listed senders are never changed. Records whose timestamp does not
/// parse are skipped by extraction, so they do not vote here either.
pub fn infer_roles(records: &[RawRecord], roster: &Roster, rules: &RuleSet) -> Roster {
    let mut hits: BTreeMap<String, (String, RuleHits)> = BTreeMap::new();

    let voting = records.iter().filter(|r| {
        !roster.contains(&r.sender)
            && parse_timestamp(&r.timestamp, &rules.timestamp_formats).is_some()
    });
    for record in voting {
        let entry = hits
            .entry(normalise(&record.sender))
            .or_insert_with(|| (record.sender.trim().to_string(), RuleHits::default()));
        let tags = matched_tags(&record.body, rules);
        let has_ticket = rules.ticket_implies_report && !rules.ticket_ids(&record.body).is_empty();
        if tags.contains(&MessageTag::IssueReport) || has_ticket {
            entry.1.reports += 1;
        }
        if tags.contains(&MessageTag::SupportResponse) {
            entry.1.responses += 1;
        }
        if tags.contains(&MessageTag::ResolutionConfirmation) {
            entry.1.resolutions += 1;
        }
    }

    let mut inferred = roster.clone();
    let (mut customers, mut staff) = (0usize, 0usize);
    for (name, h) in hits.values() {
        let role = if h.reports > h.responses
            && h.resolutions < constants::AUTO_CLASSIFY_MAX_CUSTOMER_RESOLUTIONS
        {
            customers += 1;
            SenderRole::Customer
        } else {
            staff += 1;
            SenderRole::Support
        };
        tracing::debug!(
            sender = %name,
            role = role.label(),
            reports = h.reports,
            responses = h.responses,
            resolutions = h.resolutions,
            "Sender role inferred"
        );
        inferred.insert(name, role);
    }

    if customers + staff > 0 {
        tracing::info!(customers, staff, "Inferred roles for senders missing from roster");
    }
    inferred
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rules::load_builtin_rules;
    use std::path::PathBuf;

    fn rec(sender: &str, body: &str) -> RawRecord {
        RawRecord {
            line_number: 1,
            timestamp: "1/15/24 9:00 AM".to_string(),
            sender: sender.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_parse_roster_and_lookup_case_insensitive() {
        let json = r#"{"customers": ["Ahmed"], "support_staff": [" Omar Noc "]}"#;
        let roster = parse_roster_json(json, &PathBuf::from("r.json")).unwrap();
        assert_eq!(roster.role_of("ahmed"), SenderRole::Customer);
        assert_eq!(roster.role_of("OMAR NOC"), SenderRole::Support);
        assert_eq!(roster.role_of("Stranger"), SenderRole::Unknown);
    }

    #[test]
    fn test_staff_wins_when_listed_twice() {
        let roster = Roster::from_file(RosterFile {
            customers: vec!["Sam".to_string()],
            support_staff: vec!["sam".to_string()],
        });
        assert_eq!(roster.role_of("Sam"), SenderRole::Support);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let roster = parse_roster_json("{}", &PathBuf::from("r.json")).unwrap();
        assert!(roster.is_empty());
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = parse_roster_json("not json", &PathBuf::from("r.json")).unwrap_err();
        assert!(matches!(err, RosterError::Json { .. }));
    }

    #[test]
    fn test_infer_roles() {
        let rules = load_builtin_rules().unwrap();
        let records = vec![
            rec("Ahmed", "port 3 is down"),
            rec("Ahmed", "link offline again"),
            rec("Omar", "checking"),
            rec("Omar", "done"),
            rec("Known", "port down"),
            rec("Ticketer", "9563926"),
        ];
        let mut roster = Roster::new();
        roster.insert("Known", SenderRole::Support);

        let inferred = infer_roles(&records, &roster, &rules);
        assert_eq!(inferred.role_of("Ahmed"), SenderRole::Customer);
        assert_eq!(inferred.role_of("Omar"), SenderRole::Support);
        // Listed senders keep their role even when the text says otherwise.
        assert_eq!(inferred.role_of("Known"), SenderRole::Support);
        assert_eq!(inferred.role_of("Ticketer"), SenderRole::Customer);
        // The input roster is untouched.
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_records_with_bad_timestamps_do_not_vote() {
        let rules = load_builtin_rules().unwrap();
        let mut bad = rec("Omar", "done");
        bad.timestamp = "yesterday".to_string();
        let records = vec![
            rec("Omar", "port down"),
            bad.clone(),
            bad.clone(),
            bad,
        ];
        let inferred = infer_roles(&records, &Roster::new(), &rules);
        assert_eq!(inferred.role_of("Omar"), SenderRole::Customer);
    }

    #[test]
    fn test_many_resolutions_make_staff() {
        let rules = load_builtin_rules().unwrap();
        // More report hits than response hits, but resolves a lot.
        let records: Vec<RawRecord> = (0..4).map(|_| rec("Lead", "fixed the port down")).collect();
        let inferred = infer_roles(&records, &Roster::new(), &rules);
        assert_eq!(inferred.role_of("Lead"), SenderRole::Support);
    }

    #[test]
    fn test_roster_json_round_trip_sorted() {
        let mut roster = Roster::new();
        roster.insert("Zed", SenderRole::Customer);
        roster.insert("amy", SenderRole::Customer);
        roster.insert("Omar", SenderRole::Support);
        let json = roster_to_json(&roster, &PathBuf::from("out.json")).unwrap();
        let back = parse_roster_json(&json, &PathBuf::from("out.json")).unwrap();
        assert_eq!(back, roster);
        assert_eq!(roster.to_file().customers, vec!["amy".to_string(), "Zed".to_string()]);
    }
}
