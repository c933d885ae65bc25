// SupportLens - app/rules_mgr.rs
//
// Loads the classification rule set: the built-in table embedded in the
// binary, optionally overlaid by a user-defined TOML file on disk.
// User rules override built-in rules with the same ID or category name.

use crate::core::rules::{self, RuleSet};
use crate::util::constants;
use crate::util::error::RuleError;
use std::path::Path;

/// Load the effective rule set.
///
/// A user rule file is optional, but once named any problem with it
/// (missing, oversized, invalid) is an error rather than a silent fallback
/// to the built-in rules.
pub fn load_rules(user_rules: Option<&Path>) -> Result<RuleSet, RuleError> {
    let builtin = rules::builtin_definition()?;
    tracing::debug!(
        tag_rules = builtin.rules.len(),
        categories = builtin.categories.len(),
        "Loaded built-in rule definitions"
    );

    let Some(path) = user_rules else {
        let compiled = rules::validate_and_compile(builtin, true)?;
        tracing::info!(ruleset = %compiled.name, "Using built-in rules");
        return Ok(compiled);
    };

    let overlay = load_user_definition(path)?;
    let replace = overlay.ruleset.replace_builtin;
    let merged = builtin.overlay(overlay);
    let compiled = rules::validate_and_compile(merged, false)?;

    tracing::info!(
        path = %path.display(),
        ruleset = %compiled.name,
        tag_rules = compiled.tag_rules.len(),
        categories = compiled.category_rules.len(),
        replace_builtin = replace,
        "User rules applied"
    );

    Ok(compiled)
}

fn load_user_definition(path: &Path) -> Result<rules::RuleSetDefinition, RuleError> {
    let io_err = |e| RuleError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    let metadata = std::fs::metadata(path).map_err(io_err)?;
    if metadata.len() > constants::MAX_RULE_FILE_SIZE {
        return Err(RuleError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size: constants::MAX_RULE_FILE_SIZE,
        });
    }

    let content = std::fs::read_to_string(path).map_err(io_err)?;
    rules::parse_rules_toml(&content, path)
}
