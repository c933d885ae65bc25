// SupportLens - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// All errors preserve the causal chain for diagnostic logging.
//
// Fatal vs non-fatal: `InputError`, `RuleError`, `ExportError` and
// `ConfigError` abort a run. `RecordError` never escapes the parse/extract
// passes; records are skipped and the errors collected for diagnostics.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all SupportLens operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum SupportLensError {
    /// Rule set loading or validation failed.
    Rules(RuleError),

    /// The source log could not be used at all.
    Input(InputError),

    /// Member roster loading or saving failed.
    Roster(RosterError),

    /// Issue filter construction failed.
    Filter(FilterError),

    /// Export operation failed.
    Export(ExportError),

    /// Configuration loading or validation failed.
    Config(ConfigError),
}

impl fmt::Display for SupportLensError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rules(e) => write!(f, "Rule error: {e}"),
            Self::Input(e) => write!(f, "Input error: {e}"),
            Self::Roster(e) => write!(f, "Roster error: {e}"),
            Self::Filter(e) => write!(f, "Filter error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl std::error::Error for SupportLensError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rules(e) => Some(e),
            Self::Input(e) => Some(e),
            Self::Roster(e) => Some(e),
            Self::Filter(e) => Some(e),
            Self::Export(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule errors
// ---------------------------------------------------------------------------

/// Errors related to classification rule loading and validation.
#[derive(Debug)]
pub enum RuleError {
    /// TOML file could not be parsed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Rule file exceeds the maximum allowed size.
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// A required field is missing or empty.
    MissingField {
        rule_id: String,
        field: &'static str,
    },

    /// A rule has neither keywords nor patterns, so it can never match.
    EmptyRule { rule_id: String },

    /// A regex pattern in a rule is invalid.
    InvalidRegex {
        rule_id: String,
        field: &'static str,
        pattern: String,
        source: regex::Error,
    },

    /// A regex pattern exceeds the maximum allowed length.
    RegexTooLong {
        rule_id: String,
        field: &'static str,
        length: usize,
        max_length: usize,
    },

    /// Two rules in the same table share an ID.
    DuplicateId { id: String },

    /// Maximum number of rules exceeded.
    TooManyRules { count: usize, max: usize },

    /// A timestamp format string is unusable.
    InvalidTimestampFormat { format: String, reason: String },

    /// I/O error reading a rule file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Failed to parse TOML '{}': {source}", path.display())
            }
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "Rule file '{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
            Self::MissingField { rule_id, field } => {
                write!(f, "Rule '{rule_id}': missing required field '{field}'")
            }
            Self::EmptyRule { rule_id } => {
                write!(f, "Rule '{rule_id}': has no keywords and no patterns")
            }
            Self::InvalidRegex {
                rule_id,
                field,
                pattern,
                source,
            } => write!(
                f,
                "Rule '{rule_id}': invalid regex in '{field}' ('{pattern}'): {source}"
            ),
            Self::RegexTooLong {
                rule_id,
                field,
                length,
                max_length,
            } => write!(
                f,
                "Rule '{rule_id}': regex in '{field}' is {length} chars, \
                 exceeds maximum of {max_length}"
            ),
            Self::DuplicateId { id } => write!(f, "Duplicate rule ID '{id}'"),
            Self::TooManyRules { count, max } => {
                write!(f, "Too many rules defined ({count}), maximum is {max}")
            }
            Self::InvalidTimestampFormat { format, reason } => {
                write!(f, "Invalid timestamp format '{format}': {reason}")
            }
            Self::Io { path, source } => {
                write!(f, "I/O error reading rules '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for RuleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::InvalidRegex { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<RuleError> for SupportLensError {
    fn from(e: RuleError) -> Self {
        Self::Rules(e)
    }
}

// ---------------------------------------------------------------------------
// Input errors (fatal)
// ---------------------------------------------------------------------------

/// The source log as a whole cannot be processed.
#[derive(Debug)]
pub enum InputError {
    /// The input path does not exist.
    NotFound { path: PathBuf },

    /// The input file exceeds the maximum accepted size.
    TooLarge { path: PathBuf, size: u64, max: u64 },

    /// The input contains no message records at all.
    Empty { path: PathBuf },

    /// The input could not be read.
    Unreadable { path: PathBuf, source: io::Error },

    /// A tabular input has no usable header row.
    MissingColumn { path: PathBuf, column: &'static str },

    /// The CSV reader failed before any record was produced.
    Csv { path: PathBuf, source: csv::Error },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { path } => {
                write!(f, "Source log '{}' does not exist", path.display())
            }
            Self::TooLarge { path, size, max } => write!(
                f,
                "Source log '{}' is {size} bytes, exceeds maximum of {max} bytes",
                path.display()
            ),
            Self::Empty { path } => {
                write!(f, "Source log '{}' contains no messages", path.display())
            }
            Self::Unreadable { path, source } => {
                write!(f, "Cannot read source log '{}': {source}", path.display())
            }
            Self::MissingColumn { path, column } => write!(
                f,
                "Source log '{}' has no '{column}' column in its header row",
                path.display()
            ),
            Self::Csv { path, source } => {
                write!(f, "Cannot read CSV header of '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for InputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unreadable { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<InputError> for SupportLensError {
    fn from(e: InputError) -> Self {
        Self::Input(e)
    }
}

// ---------------------------------------------------------------------------
// Record errors (non-fatal)
// ---------------------------------------------------------------------------

/// A single input record was skipped.
#[derive(Debug, Clone)]
pub enum RecordError {
    /// A line or row could not be decoded.
    LineParse {
        file: PathBuf,
        line_number: u64,
        reason: String,
    },

    /// A required field was empty.
    MissingField {
        file: PathBuf,
        line_number: u64,
        field: &'static str,
    },

    /// A timestamp string matched none of the configured formats.
    TimestampParse {
        line_number: u64,
        raw_timestamp: String,
    },
}

impl RecordError {
    /// Source line (or CSV row) the error refers to.
    pub fn line_number(&self) -> u64 {
        match self {
            Self::LineParse { line_number, .. }
            | Self::MissingField { line_number, .. }
            | Self::TimestampParse { line_number, .. } => *line_number,
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineParse {
                file,
                line_number,
                reason,
            } => write!(f, "'{}' line {line_number}: {reason}", file.display()),
            Self::MissingField {
                file,
                line_number,
                field,
            } => write!(
                f,
                "'{}' line {line_number}: empty '{field}' field",
                file.display()
            ),
            Self::TimestampParse {
                line_number,
                raw_timestamp,
            } => write!(
                f,
                "line {line_number}: cannot parse timestamp '{raw_timestamp}' \
                 with any configured format"
            ),
        }
    }
}

impl std::error::Error for RecordError {}

// ---------------------------------------------------------------------------
// Roster errors
// ---------------------------------------------------------------------------

/// Errors related to loading or saving the member roster.
#[derive(Debug)]
pub enum RosterError {
    /// JSON could not be parsed.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Roster file exceeds the maximum allowed size.
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// I/O error reading or writing the roster.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json { path, source } => {
                write!(f, "Invalid roster JSON '{}': {source}", path.display())
            }
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "Roster '{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
            Self::Io { path, source } => {
                write!(f, "Roster I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for RosterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<RosterError> for SupportLensError {
    fn from(e: RosterError) -> Self {
        Self::Roster(e)
    }
}

// ---------------------------------------------------------------------------
// Filter errors
// ---------------------------------------------------------------------------

/// Errors related to issue filter construction.
#[derive(Debug)]
pub enum FilterError {
    /// A date bound is not `YYYY-MM-DD`.
    InvalidDate {
        value: String,
        source: chrono::ParseError,
    },

    /// A status name is not one of resolved, pending, no-response.
    UnknownStatus { value: String },

    /// The date range ends before it starts.
    InvertedRange { from: String, to: String },
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDate { value, source } => {
                write!(f, "Invalid filter date '{value}' (expected YYYY-MM-DD): {source}")
            }
            Self::UnknownStatus { value } => write!(
                f,
                "Unknown status '{value}'. Valid values: resolved, pending, no-response"
            ),
            Self::InvertedRange { from, to } => {
                write!(f, "Filter date range ends ({to}) before it starts ({from})")
            }
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidDate { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<FilterError> for SupportLensError {
    fn from(e: FilterError) -> Self {
        Self::Filter(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to export operations.
#[derive(Debug)]
pub enum ExportError {
    /// I/O error writing the export file.
    Io { path: PathBuf, source: io::Error },

    /// CSV serialisation error.
    Csv { path: PathBuf, source: csv::Error },

    /// JSON serialisation error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Export I/O error '{}': {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "CSV export error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON export error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<ExportError> for SupportLensError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for SupportLensError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for SupportLens results.
pub type Result<T> = std::result::Result<T, SupportLensError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_input_error_keeps_path_and_source() {
        let err: SupportLensError = InputError::Unreadable {
            path: PathBuf::from("chat.txt"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        let text = err.to_string();
        assert!(text.contains("chat.txt"), "{text}");
        let inner = err.source().expect("input error as source");
        assert!(inner.source().is_some(), "io error should be chained");
    }

    #[test]
    fn test_record_error_line_number() {
        let err = RecordError::TimestampParse {
            line_number: 42,
            raw_timestamp: "yesterday".to_string(),
        };
        assert_eq!(err.line_number(), 42);
        assert!(err.to_string().contains("yesterday"));
    }
}
