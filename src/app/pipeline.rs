// SupportLens - app/pipeline.rs
//
// End-to-end analysis run: read the source log, resolve the roster, run
// the extraction pass, aggregate, and write every requested output.
//
// This is the only place where core logic meets the filesystem.

use crate::app::rules_mgr;
use crate::core::aggregate::{aggregate, Aggregates};
use crate::core::export::{self, ReportBundle};
use crate::core::extract::{extract, ExtractConfig, ExtractionResult, FallbackTarget, PolicyKind};
use crate::core::filter::{apply_filters, select, IssueFilter};
use crate::core::model::Issue;
use crate::core::parser::{self, InputFormat, ParseConfig, ParseResult};
use crate::core::report::{render_report, ReportContext};
use crate::core::roster::{self, Roster};
use crate::core::rules::RuleSet;
use crate::platform::config::AppConfig;
use crate::platform::fs::{self as pfs, CappedReadError};
use crate::util::constants;
use crate::util::error::{ExportError, InputError, RosterError, SupportLensError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Which output files to produce besides the text report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Csv,
    Json,
    #[default]
    Both,
}

impl OutputFormat {
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "csv" => Some(OutputFormat::Csv),
            "json" => Some(OutputFormat::Json),
            "both" => Some(OutputFormat::Both),
            _ => None,
        }
    }

    fn csv(&self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::Both)
    }

    fn json(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }
}

/// Everything one run needs, already resolved from CLI and config.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub rules_file: Option<PathBuf>,
    pub roster_file: Option<PathBuf>,
    pub auto_classify: bool,
    pub write_roster: Option<PathBuf>,
    pub extract: ExtractConfig,
    pub format: OutputFormat,
    pub filter: IssueFilter,
    pub max_input_size: u64,
    pub parse: ParseConfig,
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let mut grouping = ExtractConfig::new(PolicyKind::default());
        grouping.attach_window_minutes = Some(constants::DEFAULT_ATTACH_WINDOW_MINUTES);
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            rules_file: None,
            roster_file: None,
            auto_classify: true,
            write_roster: None,
            extract: grouping,
            format: OutputFormat::default(),
            filter: IssueFilter::default(),
            max_input_size: constants::MAX_INPUT_FILE_SIZE,
            parse: ParseConfig::default(),
        }
    }

    /// Options seeded from the validated configuration. Labels in the
    /// config have already been checked, so unknown values cannot occur
    /// here and fall back to the defaults.
    pub fn from_config(input: impl Into<PathBuf>, config: &AppConfig) -> Self {
        let mut opts = Self::new(input, config.output_dir.clone());
        opts.rules_file = config.rules_file.clone();
        opts.roster_file = config.roster_file.clone();
        opts.auto_classify = config.auto_classify;
        opts.extract.policy = PolicyKind::from_label(&config.policy).unwrap_or_default();
        opts.extract.fallback = FallbackTarget::from_label(&config.fallback).unwrap_or_default();
        opts.extract.attach_window_minutes = config.attach_window_minutes;
        opts.format = OutputFormat::from_label(&config.output_format).unwrap_or_default();
        opts.max_input_size = config.max_input_size;
        opts.parse.max_body_size = config.max_body_size;
        opts
    }
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    pub aggregates: Aggregates,
    pub report: String,
    /// Files written, in write order.
    pub written: Vec<PathBuf>,
    pub format: InputFormat,
    /// Issues extracted before filtering.
    pub issues_total: usize,
    /// Issues left after filtering (the set the aggregates cover).
    pub issues_selected: usize,
}

/// Read and decode the source log.
///
/// A file with no messages at all (empty, only system notices, or only
/// malformed lines) is a fatal input error.
pub fn load_input(
    path: &Path,
    max_size: u64,
    config: &ParseConfig,
) -> Result<(InputFormat, ParseResult), InputError> {
    if !path.exists() {
        return Err(InputError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let content = pfs::read_capped_lossy(path, max_size).map_err(|e| match e {
        CappedReadError::Io(source) => InputError::Unreadable {
            path: path.to_path_buf(),
            source,
        },
        CappedReadError::TooLarge { size, max } => InputError::TooLarge {
            path: path.to_path_buf(),
            size,
            max,
        },
    })?;

    let sample: Vec<String> = content
        .lines()
        .take(constants::FORMAT_DETECTION_LINES)
        .map(str::to_string)
        .collect();
    let format = InputFormat::detect(path, &sample);

    let parsed = match format {
        InputFormat::Csv => parser::parse_csv(content.as_bytes(), path, config)?,
        InputFormat::ChatExport => parser::parse_chat_export(&content, path, config),
    };

    for err in parsed.errors.iter().take(10) {
        tracing::debug!(error = %err, "Record skipped");
    }
    if parsed.error_count > 0 {
        tracing::warn!(
            file = %path.display(),
            errors = parsed.error_count,
            "Some records could not be parsed"
        );
    }

    if parsed.records.is_empty() {
        return Err(InputError::Empty {
            path: path.to_path_buf(),
        });
    }

    tracing::info!(
        file = %path.display(),
        format = ?format,
        records = parsed.records.len(),
        system_messages = parsed.system_messages,
        lines = parsed.lines_processed,
        "Source log loaded"
    );

    Ok((format, parsed))
}

/// Load a member roster file.
pub fn load_roster(path: &Path) -> Result<Roster, RosterError> {
    let content =
        pfs::read_capped_lossy(path, constants::MAX_ROSTER_FILE_SIZE).map_err(|e| match e {
            CappedReadError::Io(source) => RosterError::Io {
                path: path.to_path_buf(),
                source,
            },
            CappedReadError::TooLarge { size, max } => RosterError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                max_size: max,
            },
        })?;
    let roster = roster::parse_roster_json(&content, path)?;
    tracing::info!(path = %path.display(), members = roster.len(), "Roster loaded");
    Ok(roster)
}

/// Write a roster file in the shared JSON format.
pub fn save_roster(roster: &Roster, path: &Path) -> Result<(), RosterError> {
    let json = roster::roster_to_json(roster, path)?;
    pfs::write_with_parents(path, &json).map_err(|e| RosterError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), members = roster.len(), "Roster written");
    Ok(())
}

/// Resolve sender roles: the roster file if any, extended by inference
/// when enabled.
fn resolve_roster(
    opts: &RunOptions,
    parsed: &ParseResult,
    rules: &RuleSet,
) -> Result<Roster, RosterError> {
    let base = match &opts.roster_file {
        Some(path) => load_roster(path)?,
        None => Roster::new(),
    };

    if opts.auto_classify {
        Ok(roster::infer_roles(&parsed.records, &base, rules))
    } else {
        if base.is_empty() {
            tracing::warn!(
                "No roster and role inference disabled: no sender counts as support staff"
            );
        }
        Ok(base)
    }
}

fn create_output(path: &Path) -> Result<BufWriter<File>, ExportError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| ExportError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}

fn write_outputs(
    opts: &RunOptions,
    extraction: &ExtractionResult,
    selected: &[Issue],
    agg: &Aggregates,
    rules: &RuleSet,
    report: &str,
) -> Result<Vec<PathBuf>, ExportError> {
    let dir = &opts.output_dir;
    std::fs::create_dir_all(dir).map_err(|e| ExportError::Io {
        path: dir.clone(),
        source: e,
    })?;

    let mut written = Vec::new();

    if opts.format.csv() {
        let workbook = export::build_workbook(selected, &extraction.messages, agg);
        for table in &workbook.tables {
            let path = dir.join(format!("{}.csv", table.file_stem));
            let rows = export::write_table_csv(table, create_output(&path)?, &path)?;
            tracing::debug!(table = table.name, rows, path = %path.display(), "Table written");
            written.push(path);
        }
    }

    if opts.format.json() {
        let path = dir.join(constants::JSON_BUNDLE_FILE_NAME);
        let bundle = ReportBundle {
            source: opts.input.display().to_string(),
            ruleset: &rules.name,
            policy: opts.extract.policy.label(),
            aggregates: agg,
            issues: selected,
        };
        let mut out = create_output(&path)?;
        export::export_json(&bundle, &mut out, &path)?;
        out.flush().map_err(|e| ExportError::Io {
            path: path.clone(),
            source: e,
        })?;
        written.push(path);
    }

    let report_path = dir.join(constants::TEXT_REPORT_FILE_NAME);
    std::fs::write(&report_path, report).map_err(|e| ExportError::Io {
        path: report_path.clone(),
        source: e,
    })?;
    written.push(report_path);

    tracing::info!(dir = %dir.display(), files = written.len(), "Outputs written");
    Ok(written)
}

/// Run the whole analysis.
pub fn run(opts: &RunOptions) -> Result<RunSummary, SupportLensError> {
    let rules = rules_mgr::load_rules(opts.rules_file.as_deref())?;
    let (format, parsed) = load_input(&opts.input, opts.max_input_size, &opts.parse)?;

    let roster = resolve_roster(opts, &parsed, &rules)?;
    if let Some(path) = &opts.write_roster {
        save_roster(&roster, path)?;
    }

    let extraction = extract(&parsed.records, &rules, &roster, &opts.extract);

    let indices = apply_filters(&extraction.issues, &opts.filter);
    let selected = select(&extraction.issues, &indices);
    if !opts.filter.is_empty() {
        tracing::info!(
            total = extraction.issues.len(),
            selected = selected.len(),
            "Issue filter applied"
        );
    }

    let skipped = parsed.error_count + extraction.skipped_count;
    let agg = aggregate(&selected, &extraction.messages, skipped);

    let ctx = ReportContext {
        source: opts.input.display().to_string(),
        ruleset: rules.header_label(),
        policy: opts.extract.policy.label().to_string(),
    };
    let report = render_report(&agg, &ctx);

    let written = write_outputs(opts, &extraction, &selected, &agg, &rules, &report)?;

    Ok(RunSummary {
        aggregates: agg,
        report,
        written,
        format,
        issues_total: extraction.issues.len(),
        issues_selected: selected.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::SenderRole;
    use tempfile::TempDir;

    #[test]
    fn test_load_input_missing_file() {
        let err = load_input(
            Path::new("/definitely/not/here.txt"),
            1024,
            &ParseConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, InputError::NotFound { .. }));
    }

    #[test]
    fn test_load_input_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();
        let err = load_input(&path, 1024, &ParseConfig::default()).unwrap_err();
        assert!(matches!(err, InputError::Empty { .. }));
    }

    #[test]
    fn test_load_input_too_large() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.txt");
        std::fs::write(&path, "1/15/24, 9:00 AM - A: port down\n").unwrap();
        let err = load_input(&path, 4, &ParseConfig::default()).unwrap_err();
        assert!(matches!(err, InputError::TooLarge { .. }));
    }

    #[test]
    fn test_roster_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/members.json");
        let mut roster = Roster::new();
        roster.insert("Ahmed", SenderRole::Customer);
        roster.insert("Omar", SenderRole::Support);
        save_roster(&roster, &path).unwrap();
        assert_eq!(load_roster(&path).unwrap(), roster);
    }

    #[test]
    fn test_options_from_config() {
        let config = AppConfig {
            policy: "concurrent".to_string(),
            fallback: "oldest".to_string(),
            attach_window_minutes: Some(90),
            output_format: "json".to_string(),
            auto_classify: false,
            ..AppConfig::default()
        };
        let opts = RunOptions::from_config("chat.txt", &config);
        assert_eq!(opts.extract.policy, PolicyKind::Concurrent);
        assert_eq!(opts.extract.fallback, FallbackTarget::Oldest);
        assert_eq!(opts.extract.attach_window_minutes, Some(90));
        assert_eq!(opts.format, OutputFormat::Json);
        assert!(!opts.auto_classify);
        assert_eq!(opts.output_dir, config.output_dir);
    }

    #[test]
    fn test_default_attach_window() {
        let opts = RunOptions::new("chat.txt", "out");
        assert_eq!(
            opts.extract.attach_window_minutes,
            Some(constants::DEFAULT_ATTACH_WINDOW_MINUTES)
        );
        let config = AppConfig {
            attach_window_minutes: None,
            ..AppConfig::default()
        };
        assert_eq!(
            RunOptions::from_config("chat.txt", &config).extract.attach_window_minutes,
            None
        );
    }

    #[test]
    fn test_output_format_labels() {
        assert_eq!(OutputFormat::from_label("CSV"), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::from_label("xlsx"), None);
        assert!(OutputFormat::Both.csv() && OutputFormat::Both.json());
        assert!(!OutputFormat::Json.csv());
    }
}
