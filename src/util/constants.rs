// SupportLens - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "SupportLens";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "SupportLens";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file name, looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default log level when neither RUST_LOG, --debug nor config set one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Input limits
// =============================================================================

/// Maximum input file size accepted (256 MiB). Chat exports are text; a file
/// larger than this is almost certainly the wrong file.
pub const MAX_INPUT_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Maximum size of a single message body in bytes. Longer bodies are
/// truncated with `TRUNCATION_MARKER`.
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Appended to bodies cut at `MAX_BODY_SIZE`.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Number of record errors kept with full detail. Errors past this are
/// still counted.
pub const MAX_TRACKED_RECORD_ERRORS: usize = 1_000;

/// Lines sampled from the start of a file for input-format detection.
pub const FORMAT_DETECTION_LINES: usize = 20;

/// Maximum roster file size in bytes.
pub const MAX_ROSTER_FILE_SIZE: u64 = 4 * 1024 * 1024;

// =============================================================================
// Rule limits
// =============================================================================

/// Maximum regex pattern length in a rule definition (ReDoS guard).
pub const MAX_REGEX_PATTERN_LENGTH: usize = 1_024;

/// Maximum number of tag rules plus category rules in one rule set.
pub const MAX_RULES: usize = 500;

/// Maximum rule file size in bytes.
pub const MAX_RULE_FILE_SIZE: u64 = 1024 * 1024;

/// Category assigned when no category rule matches.
pub const DEFAULT_CATEGORY: &str = "other";

/// Default ticket-ID pattern: 7-digit ticket numbers such as 9563926.
pub const DEFAULT_TICKET_PATTERN: &str = r"\b\d{7}\b";

/// Timestamp formats tried in order when no rule file overrides them.
pub const DEFAULT_TIMESTAMP_FORMATS: &[&str] = &[
    "%m/%d/%y %I:%M %p",
    "%d/%m/%y %I:%M %p",
    "%m/%d/%Y %I:%M %p",
    "%d/%m/%Y %I:%M %p",
    "%m/%d/%y %I:%M:%S %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%y %H:%M",
    "%d/%m/%y %H:%M",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

// =============================================================================
// Roster inference
// =============================================================================

/// A sender with this many resolution-keyword messages or more is never
/// inferred to be a customer.
pub const AUTO_CLASSIFY_MAX_CUSTOMER_RESOLUTIONS: usize = 3;

// =============================================================================
// Grouping
// =============================================================================

/// Prefix for generated issue identifiers (`ISSUE_0001`).
pub const ISSUE_ID_PREFIX: &str = "ISSUE_";

/// Default fallback attach window: a staff message with no ticket or
/// mention only joins an issue active in the last two hours.
pub const DEFAULT_ATTACH_WINDOW_MINUTES: i64 = 120;

/// Upper bound for the configurable fallback attach window (7 days).
pub const MAX_ATTACH_WINDOW_MINUTES: i64 = 7 * 24 * 60;

// =============================================================================
// Aggregation and export
// =============================================================================

/// Response-time bucket upper edges in minutes; the last bucket is open-ended.
pub const RESPONSE_BUCKET_EDGES_MINUTES: &[f64] = &[5.0, 15.0, 30.0, 60.0];

/// Labels for the buckets above, plus the open-ended tail.
pub const RESPONSE_BUCKET_LABELS: &[&str] = &[
    "Under 5 minutes",
    "5-15 minutes",
    "15-30 minutes",
    "30-60 minutes",
    "Over 1 hour",
];

/// Number of reporters kept in the top-reporters table.
pub const TOP_REPORTERS_LIMIT: usize = 10;

/// Issue initial/final message text is cut to this many chars in exports.
pub const EXPORT_ISSUE_TEXT_CHARS: usize = 200;

/// Message content is cut to this many chars in exports.
pub const EXPORT_MESSAGE_TEXT_CHARS: usize = 300;

/// Timestamp layout used in exported tables.
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// JSON bundle file name inside the output directory.
pub const JSON_BUNDLE_FILE_NAME: &str = "report.json";

/// Text report file name inside the output directory.
pub const TEXT_REPORT_FILE_NAME: &str = "report.txt";

/// Default output directory when neither CLI nor config names one.
pub const DEFAULT_OUTPUT_DIR: &str = "support_analysis";

// =============================================================================
// Configuration ranges
// =============================================================================

/// Accepted range for `[input] max_file_size_mb`.
pub const MIN_INPUT_FILE_SIZE_MB: u64 = 1;
pub const ABSOLUTE_MAX_INPUT_FILE_SIZE_MB: u64 = 2_048;

/// Accepted range for `[input] max_body_bytes`.
pub const MIN_BODY_SIZE: usize = 256;
pub const ABSOLUTE_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Maximum config file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: u64 = 256 * 1024;

/// Grouping policy names accepted in config and on the command line.
pub const GROUPING_POLICIES: &[&str] = &["per-sender", "single", "concurrent"];

/// Fallback target names for unlinked staff messages.
pub const FALLBACK_TARGETS: &[&str] = &["most-recent", "oldest"];

/// Output format names.
pub const OUTPUT_FORMATS: &[&str] = &["csv", "json", "both"];

/// Default output format.
pub const DEFAULT_OUTPUT_FORMAT: &str = "both";

/// Log levels accepted in `[logging] level`.
pub const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];
