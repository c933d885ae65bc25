// SupportLens - core/classifier.rs
//
// Per-message classification: tag, language, ticket IDs.
// Core layer: pure functions over a compiled `RuleSet`.

use crate::core::model::{Language, MessageTag, SenderRole};
use crate::core::rules::RuleSet;
use std::collections::BTreeSet;

/// Everything the classifier derives from a single message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub tag: MessageTag,
    pub language: Language,
    pub ticket_ids: Vec<String>,
}

/// Classify one message from a sender with the given role.
pub fn classify(body: &str, role: SenderRole, rules: &RuleSet) -> Classification {
    let ticket_ids = rules.ticket_ids(body);
    let tag = classify_tag(body, role, !ticket_ids.is_empty(), rules);
    Classification {
        tag,
        language: detect_language(body),
        ticket_ids,
    }
}

/// Pick the tag for a message.
///
/// Every rule whose sender scope admits `role` and whose matcher hits the
/// body contributes its tag; the greatest tag in precedence order wins.
pub fn classify_tag(body: &str, role: SenderRole, has_ticket: bool, rules: &RuleSet) -> MessageTag {
    let lower = body.to_lowercase();

    let mut tag = rules
        .tag_rules
        .iter()
        .filter(|r| r.scope.admits(role))
        .filter(|r| r.matcher.is_match(body, &lower))
        .map(|r| r.tag)
        .max()
        .unwrap_or(MessageTag::Unclassified);

    if tag == MessageTag::Unclassified {
        if rules.ticket_implies_report && has_ticket && role.is_reporter() {
            tag = MessageTag::IssueReport;
        } else if rules.staff_fallback_response && role == SenderRole::Support {
            tag = MessageTag::SupportResponse;
        }
    }

    tag
}

/// Tags whose rules match the body, ignoring sender scope. Used to guess
/// the role of senders missing from the roster.
pub fn matched_tags(body: &str, rules: &RuleSet) -> BTreeSet<MessageTag> {
    let lower = body.to_lowercase();
    rules
        .tag_rules
        .iter()
        .filter(|r| r.matcher.is_match(body, &lower))
        .map(|r| r.tag)
        .collect()
}

fn is_arabic(c: char) -> bool {
    matches!(c,
        '\u{0600}'..='\u{06FF}'
        | '\u{0750}'..='\u{077F}'
        | '\u{FB50}'..='\u{FDFF}'
        | '\u{FE70}'..='\u{FEFF}')
}

/// Dominant script of a body: a script wins when it has more than twice
/// the letters of the other, otherwise the message is mixed.
pub fn detect_language(body: &str) -> Language {
    let (arabic, latin) = body.chars().fold((0usize, 0usize), |(a, l), c| {
        if is_arabic(c) {
            (a + 1, l)
        } else if c.is_ascii_alphabetic() {
            (a, l + 1)
        } else {
            (a, l)
        }
    });

    if arabic > latin * 2 {
        Language::Arabic
    } else if latin > arabic * 2 {
        Language::English
    } else {
        Language::Mixed
    }
}
