// SupportLens - core/rules.rs
//
// Classification rule set loading, validation, and compilation.
// Core layer: accepts TOML strings, never touches the filesystem.
// I/O is handled by app::rules_mgr which feeds content here.

use crate::core::model::{MessageTag, SenderRole};
use crate::util::constants;
use crate::util::error::RuleError;
use chrono::format::{Item, StrftimeItems};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

// =============================================================================
// TOML deserialization structures (raw input)
// =============================================================================

/// Raw TOML rule set as deserialized from a .toml file.
/// Validated and compiled into a `RuleSet` for runtime use.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RuleSetDefinition {
    #[serde(default)]
    pub ruleset: RuleSetMeta,
    #[serde(default)]
    pub settings: SettingsDef,
    #[serde(default, rename = "rule")]
    pub rules: Vec<TagRuleDef>,
    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryRuleDef>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RuleSetMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// When true, an overlay drops every rule of the base set instead of
    /// merging by ID.
    #[serde(default)]
    pub replace_builtin: bool,
}

/// `[settings]` table. Every field is optional so an overlay only changes
/// what it names.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SettingsDef {
    pub ticket_pattern: Option<String>,
    pub ticket_implies_report: Option<bool>,
    pub staff_fallback_response: Option<bool>,
    pub timestamp_formats: Option<Vec<String>>,
}

/// Which senders a tag rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SenderScope {
    /// Anyone not known to be support staff.
    Reporter,
    /// Known support staff only.
    Staff,
    #[default]
    Any,
}

impl SenderScope {
    pub fn admits(&self, role: SenderRole) -> bool {
        match self {
            SenderScope::Reporter => role.is_reporter(),
            SenderScope::Staff => role == SenderRole::Support,
            SenderScope::Any => true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagRuleDef {
    pub id: String,
    pub tag: MessageTag,
    #[serde(default)]
    pub senders: SenderScope,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRuleDef {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl RuleSetDefinition {
    /// Layer `overlay` on top of `self`.
    ///
    /// Tag rules are merged by `id` and categories by `name`: a match
    /// replaces the base entry in place, anything new is appended, so base
    /// ordering is kept. `replace_builtin = true` discards the base rules.
    /// Settings present in the overlay win.
    pub fn overlay(mut self, overlay: RuleSetDefinition) -> RuleSetDefinition {
        if overlay.ruleset.replace_builtin {
            self.rules.clear();
            self.categories.clear();
        }

        for rule in overlay.rules {
            match self.rules.iter().position(|r| r.id == rule.id) {
                Some(pos) => self.rules[pos] = rule,
                None => self.rules.push(rule),
            }
        }
        for cat in overlay.categories {
            match self.categories.iter().position(|c| c.name == cat.name) {
                Some(pos) => self.categories[pos] = cat,
                None => self.categories.push(cat),
            }
        }

        let s = overlay.settings;
        if s.ticket_pattern.is_some() {
            self.settings.ticket_pattern = s.ticket_pattern;
        }
        if s.ticket_implies_report.is_some() {
            self.settings.ticket_implies_report = s.ticket_implies_report;
        }
        if s.staff_fallback_response.is_some() {
            self.settings.staff_fallback_response = s.staff_fallback_response;
        }
        if s.timestamp_formats.is_some() {
            self.settings.timestamp_formats = s.timestamp_formats;
        }

        if !overlay.ruleset.name.is_empty() {
            self.ruleset.name = overlay.ruleset.name;
            self.ruleset.description = overlay.ruleset.description;
        }
        self
    }
}

// =============================================================================
// Compiled rule set (runtime representation)
// =============================================================================

/// Keyword/pattern matcher shared by tag and category rules.
#[derive(Debug, Clone)]
pub struct Matcher {
    /// Lowercased substrings.
    keywords: Vec<String>,
    /// Case-insensitive regexes.
    patterns: Vec<Regex>,
}

impl Matcher {
    /// `body_lower` must be `body.to_lowercase()`; callers lowercase once
    /// per message rather than once per rule.
    pub fn is_match(&self, body: &str, body_lower: &str) -> bool {
        self.keywords.iter().any(|k| body_lower.contains(k.as_str()))
            || self.patterns.iter().any(|p| p.is_match(body))
    }
}

#[derive(Debug, Clone)]
pub struct TagRule {
    pub id: String,
    pub tag: MessageTag,
    pub scope: SenderScope,
    pub matcher: Matcher,
}

#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub name: String,
    pub matcher: Matcher,
}

/// Runtime rule set: the explicit classifier configuration passed into the
/// extraction pass.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub name: String,
    pub description: String,
    pub tag_rules: Vec<TagRule>,
    /// Tried in order; first match wins.
    pub category_rules: Vec<CategoryRule>,
    pub ticket_pattern: Regex,
    /// A reporter message carrying a ticket ID counts as an issue report.
    pub ticket_implies_report: bool,
    /// A staff message matching no rule counts as a support response.
    pub staff_fallback_response: bool,
    /// chrono formats tried in order by the timestamp normaliser.
    pub timestamp_formats: Vec<String>,
    pub is_builtin: bool,
}

impl RuleSet {
    /// Category of an issue opened by `body`.
    pub fn category_for(&self, body: &str) -> &str {
        let lower = body.to_lowercase();
        self.category_rules
            .iter()
            .find(|c| c.matcher.is_match(body, &lower))
            .map(|c| c.name.as_str())
            .unwrap_or(constants::DEFAULT_CATEGORY)
    }

    /// Ticket IDs in `body`, deduplicated, in order of appearance.
    pub fn ticket_ids(&self, body: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.ticket_pattern
            .find_iter(body)
            .map(|m| m.as_str().to_string())
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }

    /// Report header label: name, origin and description.
    pub fn header_label(&self) -> String {
        let origin = if self.is_builtin { "built-in" } else { "user" };
        if self.description.is_empty() {
            format!("{} ({origin})", self.name)
        } else {
            format!("{} ({origin}) - {}", self.name, self.description)
        }
    }
}

// =============================================================================
// Validation and compilation
// =============================================================================

/// Parse a TOML string into a `RuleSetDefinition`.
///
/// `source_path` is used for error messages only (not for I/O).
pub fn parse_rules_toml(
    toml_content: &str,
    source_path: &Path,
) -> Result<RuleSetDefinition, RuleError> {
    toml::from_str(toml_content).map_err(|e| RuleError::TomlParse {
        path: source_path.to_path_buf(),
        source: e,
    })
}

/// Validate a `RuleSetDefinition` and compile it into a runtime `RuleSet`.
///
/// Validates:
/// - IDs and names are present and unique
/// - every rule can match something
/// - regex patterns are valid and within size limits
/// - timestamp formats contain no invalid specifiers
pub fn validate_and_compile(
    def: RuleSetDefinition,
    is_builtin: bool,
) -> Result<RuleSet, RuleError> {
    let total = def.rules.len() + def.categories.len();
    if total > constants::MAX_RULES {
        return Err(RuleError::TooManyRules {
            count: total,
            max: constants::MAX_RULES,
        });
    }

    let mut ids = HashSet::new();
    let mut tag_rules = Vec::with_capacity(def.rules.len());
    for rule in def.rules {
        if rule.id.trim().is_empty() {
            return Err(RuleError::MissingField {
                rule_id: "(empty)".to_string(),
                field: "rule.id",
            });
        }
        if !ids.insert(rule.id.clone()) {
            return Err(RuleError::DuplicateId { id: rule.id });
        }
        let matcher = compile_matcher(&rule.id, "rule.patterns", rule.keywords, &rule.patterns)?;
        tag_rules.push(TagRule {
            id: rule.id,
            tag: rule.tag,
            scope: rule.senders,
            matcher,
        });
    }

    let mut names = HashSet::new();
    let mut category_rules = Vec::with_capacity(def.categories.len());
    for cat in def.categories {
        if cat.name.trim().is_empty() {
            return Err(RuleError::MissingField {
                rule_id: "(empty)".to_string(),
                field: "category.name",
            });
        }
        if !names.insert(cat.name.clone()) {
            return Err(RuleError::DuplicateId { id: cat.name });
        }
        let matcher =
            compile_matcher(&cat.name, "category.patterns", cat.keywords, &cat.patterns)?;
        category_rules.push(CategoryRule {
            name: cat.name,
            matcher,
        });
    }

    let ticket_src = def
        .settings
        .ticket_pattern
        .unwrap_or_else(|| constants::DEFAULT_TICKET_PATTERN.to_string());
    let ticket_pattern = compile_regex("settings", "settings.ticket_pattern", &ticket_src, false)?;

    let timestamp_formats = match def.settings.timestamp_formats {
        Some(formats) if !formats.is_empty() => formats,
        _ => constants::DEFAULT_TIMESTAMP_FORMATS
            .iter()
            .map(|s| s.to_string())
            .collect(),
    };
    for format in &timestamp_formats {
        validate_timestamp_format(format)?;
    }

    let name = if def.ruleset.name.is_empty() {
        "unnamed".to_string()
    } else {
        def.ruleset.name
    };

    tracing::debug!(
        ruleset = %name,
        tag_rules = tag_rules.len(),
        categories = category_rules.len(),
        formats = timestamp_formats.len(),
        "Rule set compiled"
    );

    Ok(RuleSet {
        name,
        description: def.ruleset.description,
        tag_rules,
        category_rules,
        ticket_pattern,
        ticket_implies_report: def.settings.ticket_implies_report.unwrap_or(true),
        staff_fallback_response: def.settings.staff_fallback_response.unwrap_or(false),
        timestamp_formats,
        is_builtin,
    })
}

fn compile_matcher(
    rule_id: &str,
    field: &'static str,
    keywords: Vec<String>,
    patterns: &[String],
) -> Result<Matcher, RuleError> {
    let keywords: Vec<String> = keywords
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    let patterns = patterns
        .iter()
        .map(|p| compile_regex(rule_id, field, p, true))
        .collect::<Result<Vec<_>, _>>()?;

    if keywords.is_empty() && patterns.is_empty() {
        return Err(RuleError::EmptyRule {
            rule_id: rule_id.to_string(),
        });
    }
    Ok(Matcher { keywords, patterns })
}

/// Compile a regex pattern with length validation to prevent ReDoS.
fn compile_regex(
    rule_id: &str,
    field: &'static str,
    pattern: &str,
    case_insensitive: bool,
) -> Result<Regex, RuleError> {
    if pattern.len() > constants::MAX_REGEX_PATTERN_LENGTH {
        return Err(RuleError::RegexTooLong {
            rule_id: rule_id.to_string(),
            field,
            length: pattern.len(),
            max_length: constants::MAX_REGEX_PATTERN_LENGTH,
        });
    }

    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| RuleError::InvalidRegex {
            rule_id: rule_id.to_string(),
            field,
            pattern: pattern.to_string(),
            source: e,
        })
}

fn validate_timestamp_format(format: &str) -> Result<(), RuleError> {
    if format.trim().is_empty() {
        return Err(RuleError::InvalidTimestampFormat {
            format: format.to_string(),
            reason: "format is empty".to_string(),
        });
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(RuleError::InvalidTimestampFormat {
            format: format.to_string(),
            reason: "contains an unknown % specifier".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Built-in rule set (embedded at compile time)
// =============================================================================

/// Embedded TOML content of the built-in rule set.
pub fn builtin_rules_source() -> &'static str {
    include_str!("../../rules/default_rules.toml")
}

/// Parse the embedded built-in definition.
pub fn builtin_definition() -> Result<RuleSetDefinition, RuleError> {
    parse_rules_toml(builtin_rules_source(), Path::new("<builtin>/default_rules.toml"))
}

/// Load and compile the built-in rule set.
pub fn load_builtin_rules() -> Result<RuleSet, RuleError> {
    let rules = validate_and_compile(builtin_definition()?, true)?;
    tracing::debug!(ruleset = %rules.name, "Loaded built-in rules");
    Ok(rules)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_RULES_TOML: &str = r#"
[ruleset]
name = "test-rules"

[settings]
ticket_pattern = '\bT-\d+\b'
timestamp_formats = ["%Y-%m-%d %H:%M"]

[[rule]]
id = "report"
tag = "issue-report"
senders = "reporter"
keywords = ["Broken"]

[[rule]]
id = "fix"
tag = "resolution-confirmation"
senders = "staff"
patterns = ['\bfixed\b']

[[category]]
name = "hardware"
keywords = ["disk"]
"#;

    fn compile(toml: &str) -> Result<RuleSet, RuleError> {
        let path = PathBuf::from("test.toml");
        validate_and_compile(parse_rules_toml(toml, &path)?, false)
    }

    #[test]
    fn test_compile_valid_rules() {
        let rules = compile(VALID_RULES_TOML).unwrap();
        assert_eq!(rules.name, "test-rules");
        assert_eq!(rules.tag_rules.len(), 2);
        assert_eq!(rules.tag_rules[0].scope, SenderScope::Reporter);
        assert_eq!(rules.timestamp_formats, vec!["%Y-%m-%d %H:%M"]);
        assert!(!rules.is_builtin);
    }

    #[test]
    fn test_header_label_names_origin() {
        let user = compile(VALID_RULES_TOML).unwrap();
        assert!(user.header_label().starts_with("test-rules (user)"));

        let builtin = load_builtin_rules().unwrap();
        assert_eq!(
            builtin.header_label(),
            format!("builtin (built-in) - {}", builtin.description)
        );
        assert!(!builtin.description.is_empty());
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let rules = compile(VALID_RULES_TOML).unwrap();
        let rule = &rules.tag_rules[0];
        let body = "router BROKEN again";
        assert!(rule.matcher.is_match(body, &body.to_lowercase()));
    }

    #[test]
    fn test_patterns_respect_word_boundaries() {
        let rules = compile(VALID_RULES_TOML).unwrap();
        let rule = &rules.tag_rules[1];
        assert!(rule.matcher.is_match("Fixed it", "fixed it"));
        assert!(!rule.matcher.is_match("unfixedness", "unfixedness"));
    }

    #[test]
    fn test_category_falls_back_to_other() {
        let rules = compile(VALID_RULES_TOML).unwrap();
        assert_eq!(rules.category_for("disk full"), "hardware");
        assert_eq!(rules.category_for("printer jam"), "other");
    }

    #[test]
    fn test_ticket_ids_deduplicated() {
        let rules = compile(VALID_RULES_TOML).unwrap();
        assert_eq!(
            rules.ticket_ids("see T-12 and T-7, T-12 again"),
            vec!["T-12", "T-7"]
        );
    }

    #[test]
    fn test_rule_without_matchers_rejected() {
        let toml = r#"
[[rule]]
id = "empty"
tag = "issue-report"
"#;
        match compile(toml).unwrap_err() {
            RuleError::EmptyRule { rule_id } => assert_eq!(rule_id, "empty"),
            other => panic!("Expected EmptyRule, got: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_rule_id_rejected() {
        let toml = r#"
[[rule]]
id = "a"
tag = "issue-report"
keywords = ["x"]

[[rule]]
id = "a"
tag = "support-response"
keywords = ["y"]
"#;
        assert!(matches!(
            compile(toml).unwrap_err(),
            RuleError::DuplicateId { .. }
        ));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let toml = r#"
[[rule]]
id = "bad"
tag = "issue-report"
patterns = ["[invalid"]
"#;
        assert!(matches!(
            compile(toml).unwrap_err(),
            RuleError::InvalidRegex { .. }
        ));
    }

    #[test]
    fn test_regex_too_long_rejected() {
        let long_pattern = "a".repeat(constants::MAX_REGEX_PATTERN_LENGTH + 1);
        let toml = format!(
            r#"
[[rule]]
id = "long"
tag = "issue-report"
patterns = ['{long_pattern}']
"#
        );
        assert!(matches!(
            compile(&toml).unwrap_err(),
            RuleError::RegexTooLong { .. }
        ));
    }

    #[test]
    fn test_invalid_timestamp_format_rejected() {
        let toml = r#"
[settings]
timestamp_formats = ["%Y-%m-%d %Q"]

[[rule]]
id = "r"
tag = "issue-report"
keywords = ["x"]
"#;
        assert!(matches!(
            compile(toml).unwrap_err(),
            RuleError::InvalidTimestampFormat { .. }
        ));
    }

    #[test]
    fn test_unknown_tag_is_parse_error() {
        let toml = r#"
[[rule]]
id = "r"
tag = "complaint"
keywords = ["x"]
"#;
        let path = PathBuf::from("t.toml");
        assert!(matches!(
            parse_rules_toml(toml, &path).unwrap_err(),
            RuleError::TomlParse { .. }
        ));
    }

    #[test]
    fn test_overlay_replaces_by_id_and_appends() {
        let base = builtin_definition().unwrap();
        let base_len = base.rules.len();
        let overlay = parse_rules_toml(
            r#"
[settings]
staff_fallback_response = true

[[rule]]
id = "ack-en"
tag = "support-response"
senders = "staff"
keywords = ["roger"]

[[rule]]
id = "custom"
tag = "issue-report"
keywords = ["help"]
"#,
            Path::new("user.toml"),
        )
        .unwrap();

        let merged = validate_and_compile(base.overlay(overlay), false).unwrap();
        assert_eq!(merged.tag_rules.len(), base_len + 1);
        assert!(merged.staff_fallback_response);
        let ack = merged.tag_rules.iter().find(|r| r.id == "ack-en").unwrap();
        assert!(ack.matcher.is_match("roger", "roger"));
        assert!(!ack.matcher.is_match("checking", "checking"));
        assert_eq!(merged.tag_rules.last().unwrap().id, "custom");
    }

    #[test]
    fn test_overlay_replace_builtin_drops_base_rules() {
        let base = builtin_definition().unwrap();
        let overlay = parse_rules_toml(
            r#"
[ruleset]
name = "mine"
replace_builtin = true

[[rule]]
id = "only"
tag = "issue-report"
keywords = ["help"]
"#,
            Path::new("user.toml"),
        )
        .unwrap();
        let merged = validate_and_compile(base.overlay(overlay), false).unwrap();
        assert_eq!(merged.name, "mine");
        assert_eq!(merged.tag_rules.len(), 1);
        assert!(merged.category_rules.is_empty());
    }

    #[test]
    fn test_load_builtin_rules() {
        let rules = load_builtin_rules().unwrap();
        assert!(rules.is_builtin);
        for tag in [
            MessageTag::IssueReport,
            MessageTag::SupportResponse,
            MessageTag::ResolutionConfirmation,
        ] {
            assert!(rules.tag_rules.iter().any(|r| r.tag == tag), "no rule for {tag:?}");
        }
        assert_eq!(rules.category_for("port is down"), "connectivity");
        assert_eq!(rules.category_for("zabbix lost the host"), "monitoring-alert");
        assert_eq!(rules.ticket_ids("ticket 9563926 raised"), vec!["9563926"]);
    }
}
