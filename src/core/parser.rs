// SupportLens - core/parser.rs
//
// Decodes the source log into ordered `RawRecord`s.
// Core layer: accepts strings and Read trait objects, never touches the
// filesystem directly.
//
// Two boundary formats are understood:
//   - tabular CSV with timestamp / sender / body columns
//   - WhatsApp "export chat" text files

use crate::core::model::RawRecord;
use crate::util::constants;
use crate::util::error::{InputError, RecordError};
use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

/// Configuration for parsing operations.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    pub max_body_size: usize,
    pub max_tracked_errors: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_body_size: constants::MAX_BODY_SIZE,
            max_tracked_errors: constants::MAX_TRACKED_RECORD_ERRORS,
        }
    }
}

/// Result of decoding one input file.
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Records in file order.
    pub records: Vec<RawRecord>,
    /// Record errors (capped at `max_tracked_errors`).
    pub errors: Vec<RecordError>,
    /// Total record errors, including the ones not kept in `errors`.
    pub error_count: usize,
    /// Chat system notices (encryption banner, joins, deleted messages)
    /// that were dropped.
    pub system_messages: usize,
    /// Total lines (text) or rows (CSV) processed.
    pub lines_processed: u64,
}

impl ParseResult {
    fn push_error(&mut self, error: RecordError, cap: usize) {
        self.error_count += 1;
        if self.errors.len() < cap {
            self.errors.push(error);
        }
    }
}

// =============================================================================
// Format detection
// =============================================================================

/// Boundary format of the source log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    ChatExport,
}

impl InputFormat {
    /// Pick the decoder for a file from its extension, then from its first
    /// non-empty line: a header naming a timestamp and a sender column means
    /// CSV, anything else is treated as a chat export.
    pub fn detect(path: &Path, sample_lines: &[String]) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        if ext.as_deref() == Some("csv") {
            return InputFormat::Csv;
        }

        let header = sample_lines.iter().find(|l| !l.trim().is_empty());
        let detected = match header {
            Some(line) => {
                let cols: Vec<String> = line
                    .split(',')
                    .map(|c| c.trim().trim_matches('"').to_lowercase())
                    .collect();
                let has = |aliases: &[&str]| cols.iter().any(|c| aliases.contains(&c.as_str()));
                if has(TIMESTAMP_COLUMNS) && has(SENDER_COLUMNS) {
                    InputFormat::Csv
                } else {
                    InputFormat::ChatExport
                }
            }
            None => InputFormat::ChatExport,
        };

        tracing::debug!(file = %path.display(), format = ?detected, "Input format detected");
        detected
    }
}

// =============================================================================
// CSV
// =============================================================================

const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "time", "date", "datetime"];
const SENDER_COLUMNS: &[&str] = &["sender", "from", "author", "name"];
const BODY_COLUMNS: &[&str] = &["body", "message", "content", "text"];

fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.contains(&h.trim().to_lowercase().as_str()))
}

/// Decode a CSV message table.
///
/// A missing header column is fatal (no row could be interpreted); a bad
/// row is recorded and skipped.
pub fn parse_csv<R: Read>(
    reader: R,
    file_path: &Path,
    config: &ParseConfig,
) -> Result<ParseResult, InputError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| InputError::Csv {
            path: file_path.to_path_buf(),
            source: e,
        })?
        .clone();

    let missing = |column| InputError::MissingColumn {
        path: file_path.to_path_buf(),
        column,
    };
    let ts_col = find_column(&headers, TIMESTAMP_COLUMNS).ok_or_else(|| missing("timestamp"))?;
    let sender_col = find_column(&headers, SENDER_COLUMNS).ok_or_else(|| missing("sender"))?;
    let body_col = find_column(&headers, BODY_COLUMNS).ok_or_else(|| missing("body"))?;

    let mut result = ParseResult::default();
    let cap = config.max_tracked_errors;

    for (row_idx, row) in csv_reader.records().enumerate() {
        result.lines_processed += 1;
        // Header is line 1; without position info fall back to row index.
        let fallback_line = row_idx as u64 + 2;

        let record = match row {
            Ok(r) => r,
            Err(e) => {
                let line_number = e
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(fallback_line);
                result.push_error(
                    RecordError::LineParse {
                        file: file_path.to_path_buf(),
                        line_number,
                        reason: e.to_string(),
                    },
                    cap,
                );
                continue;
            }
        };
        let line_number = record
            .position()
            .map(|p| p.line())
            .unwrap_or(fallback_line);

        let field = |idx: usize| record.get(idx).unwrap_or("").trim();
        let (timestamp, sender, body) = (field(ts_col), field(sender_col), field(body_col));

        let empty = [("timestamp", timestamp), ("sender", sender), ("body", body)]
            .into_iter()
            .find(|(_, v)| v.is_empty());
        if let Some((name, _)) = empty {
            result.push_error(
                RecordError::MissingField {
                    file: file_path.to_path_buf(),
                    line_number,
                    field: name,
                },
                cap,
            );
            continue;
        }

        let mut body = body.to_string();
        truncate_body(&mut body, config.max_body_size);
        result.records.push(RawRecord {
            line_number,
            timestamp: timestamp.to_string(),
            sender: sender.to_string(),
            body,
        });
    }

    tracing::debug!(
        file = %file_path.display(),
        records = result.records.len(),
        errors = result.error_count,
        rows = result.lines_processed,
        "CSV parsing complete"
    );

    Ok(result)
}

// =============================================================================
// WhatsApp chat export
// =============================================================================

fn message_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Android:  1/15/24, 9:05 AM - Sender: text
        // iOS:      [1/15/24, 9:05:12 AM] Sender: text
        Regex::new(
            r"^\[?(?P<date>\d{1,2}/\d{1,2}/\d{2,4}),?\s+(?P<time>\d{1,2}:\d{2}(?::\d{2})?)(?:\s*(?P<ampm>[AaPp]\.?\s?[Mm]\.?))?\]?\s*(?:[-–—]\s*)?(?P<sender>[^:]+?):\s*(?P<body>.*)$",
        )
        .expect("message line regex is valid")
    })
}

fn event_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A timestamped line with no "Sender:" part is a group event
    // ("X created group", "Y left").
    RE.get_or_init(|| {
        Regex::new(r"^\[?\d{1,2}/\d{1,2}/\d{2,4},?\s+\d{1,2}:\d{2}")
            .expect("event line regex is valid")
    })
}

/// Message bodies WhatsApp inserts itself.
const SYSTEM_BODIES: &[&str] = &[
    "<media omitted>",
    "this message was deleted",
    "you deleted this message",
    "null",
];

/// Substrings that mark a system notice wherever they appear.
const SYSTEM_MARKERS: &[&str] = &[
    "messages and calls are end-to-end encrypted",
    "joined using this group's invite link",
];

fn is_system_body(body: &str) -> bool {
    let lower = body.trim().to_lowercase();
    SYSTEM_BODIES.contains(&lower.as_str()) || SYSTEM_MARKERS.iter().any(|m| lower.contains(m))
}

/// Replace the invisible spacing and direction marks WhatsApp sprinkles
/// around timestamps and names.
fn normalise_line(line: &str) -> String {
    line.chars()
        .filter(|c| !matches!(c, '\u{200E}' | '\u{200F}' | '\u{FEFF}'))
        .map(|c| match c {
            '\u{202F}' | '\u{00A0}' | '\u{2068}' | '\u{2069}' => ' ',
            other => other,
        })
        .collect()
}

/// Decode a WhatsApp chat export.
///
/// Lines that start a message are matched against the export line pattern;
/// lines that do not are continuation lines of the previous message.
/// Group event lines and system notices are dropped and counted.
pub fn parse_chat_export(content: &str, file_path: &Path, config: &ParseConfig) -> ParseResult {
    let mut result = ParseResult::default();
    let cap = config.max_tracked_errors;
    // System notices may have continuation lines too; those are dropped
    // with the notice rather than glued onto the previous real message.
    let mut in_system_block = false;

    for (line_idx, raw_line) in content.lines().enumerate() {
        result.lines_processed += 1;
        let line_number = line_idx as u64 + 1;
        let line = normalise_line(raw_line);

        if line.trim().is_empty() {
            if let Some(last) = result.records.last_mut().filter(|_| !in_system_block) {
                last.body.push('\n');
            }
            continue;
        }

        if let Some(caps) = message_line_re().captures(&line) {
            let body = caps.name("body").map(|m| m.as_str()).unwrap_or("");
            if is_system_body(body) {
                result.system_messages += 1;
                in_system_block = true;
                continue;
            }
            in_system_block = false;

            let date = &caps["date"];
            let time = &caps["time"];
            let timestamp = match caps.name("ampm") {
                Some(m) => {
                    let ampm: String = m
                        .as_str()
                        .chars()
                        .filter(|c| c.is_ascii_alphabetic())
                        .collect::<String>()
                        .to_uppercase();
                    format!("{date} {time} {ampm}")
                }
                None => format!("{date} {time}"),
            };

            let sender = caps["sender"].trim().to_string();
            let mut body = body.trim_end().to_string();
            truncate_body(&mut body, config.max_body_size);

            result.records.push(RawRecord {
                line_number,
                timestamp,
                sender,
                body,
            });
        } else if event_line_re().is_match(&line) {
            result.system_messages += 1;
            in_system_block = true;
        } else if in_system_block {
            // Continuation of a dropped notice.
        } else if let Some(last) = result.records.last_mut() {
            // Skip the append once the body is at its cap so a pathological
            // file cannot grow one message without bound.
            if last.body.len() <= config.max_body_size {
                last.body.push('\n');
                last.body.push_str(line.trim_end());
                truncate_body(&mut last.body, config.max_body_size);
            }
        } else {
            result.push_error(
                RecordError::LineParse {
                    file: file_path.to_path_buf(),
                    line_number,
                    reason: "Line does not start a message and has no message to continue"
                        .to_string(),
                },
                cap,
            );
        }
    }

    for record in &mut result.records {
        let trimmed = record.body.trim_end().len();
        record.body.truncate(trimmed);
    }

    tracing::debug!(
        file = %file_path.display(),
        records = result.records.len(),
        system = result.system_messages,
        errors = result.error_count,
        lines = result.lines_processed,
        "Chat export parsing complete"
    );

    result
}

/// Cut `body` to at most `max` bytes on a char boundary and mark it.
fn truncate_body(body: &mut String, max: usize) {
    if body.len() <= max {
        return;
    }
    let mut cut = max;
    while cut > 0 && !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body.truncate(cut);
    body.push_str(constants::TRUNCATION_MARKER);
}

// =============================================================================
// Timestamps
// =============================================================================

/// Parse a raw timestamp with the first matching format, falling back to
/// RFC 3339 (local wall-clock time is kept, the offset dropped).
pub fn parse_timestamp(raw: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    formats
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

// =============================================================================
// Tests
// =============================================================================
