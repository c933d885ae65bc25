// SupportLens - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Configuration loading (explicit file or platform default)
// 3. Logging initialisation (debug mode support)
// 4. The analysis run and console report

use clap::Parser;
use std::path::PathBuf;
use supportlens::app::pipeline::{self, OutputFormat, RunOptions};
use supportlens::core::extract::{FallbackTarget, PolicyKind};
use supportlens::platform::config::{self, AppConfig, PlatformPaths};
use supportlens::util::error::SupportLensError;
use supportlens::util::{constants, logging};

/// SupportLens - support-chat KPI extractor.
///
/// Reads an exported support group chat (WhatsApp text export or a
/// message CSV), reconstructs the reported issues, and writes issue,
/// timing and staff performance tables plus a text report.
#[derive(Parser, Debug)]
#[command(name = "supportlens", version, about)]
struct Cli {
    /// Chat export (.txt) or message table (.csv) to analyse.
    input: PathBuf,

    /// Output directory for tables and reports.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Configuration file (defaults to the platform config directory).
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// User rule file overlaid on the built-in classification rules.
    #[arg(short = 'r', long = "rules")]
    rules: Option<PathBuf>,

    /// Member roster (JSON with "customers" and "support_staff" lists).
    #[arg(short = 'm', long = "roster")]
    roster: Option<PathBuf>,

    /// How concurrent reports from the group are grouped into issues.
    #[arg(long, value_parser = ["per-sender", "single", "concurrent"])]
    policy: Option<String>,

    /// Open issue an unlinked staff message attaches to.
    #[arg(long, value_parser = ["most-recent", "oldest"])]
    fallback: Option<String>,

    /// Only attach unlinked staff messages to issues active within this many
    /// minutes (default 120, 0 disables the window).
    #[arg(long = "attach-window", value_name = "MINUTES")]
    attach_window: Option<i64>,

    /// Which tables to write besides report.txt.
    #[arg(long, value_parser = ["csv", "json", "both"])]
    format: Option<String>,

    /// Keep only issues with these statuses (resolved, pending, no-response).
    #[arg(long, value_delimiter = ',')]
    status: Vec<String>,

    /// Keep only issues in these categories.
    #[arg(long, value_delimiter = ',')]
    category: Vec<String>,

    /// Keep only issues opened by these reporters.
    #[arg(long, value_delimiter = ',')]
    reporter: Vec<String>,

    /// Keep only issues reported on or after this date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    from: Option<String>,

    /// Keep only issues reported on or before this date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    to: Option<String>,

    /// Save the resolved roster (including inferred roles) to this file.
    #[arg(long = "write-roster", value_name = "PATH")]
    write_roster: Option<PathBuf>,

    /// Use the roster as given, without inferring roles of unlisted senders.
    #[arg(long = "no-auto-classify")]
    no_auto_classify: bool,

    /// Do not print the report to stdout.
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn load_app_config(cli: &Cli) -> Result<(AppConfig, Vec<String>), SupportLensError> {
    match &cli.config {
        Some(path) => Ok(config::load_config_file(path)?),
        None => Ok(config::load_config(&PlatformPaths::resolve().config_dir)),
    }
}

/// Apply CLI overrides on top of the configured options.
fn build_options(cli: Cli, config: &AppConfig) -> Result<RunOptions, SupportLensError> {
    let mut opts = RunOptions::from_config(cli.input, config);

    if let Some(dir) = cli.output {
        opts.output_dir = dir;
    }
    if cli.rules.is_some() {
        opts.rules_file = cli.rules;
    }
    if cli.roster.is_some() {
        opts.roster_file = cli.roster;
    }
    if cli.no_auto_classify {
        opts.auto_classify = false;
    }
    if let Some(policy) = cli.policy.as_deref().and_then(PolicyKind::from_label) {
        opts.extract.policy = policy;
    }
    if let Some(fallback) = cli.fallback.as_deref().and_then(FallbackTarget::from_label) {
        opts.extract.fallback = fallback;
    }
    if cli.attach_window.is_some() {
        opts.extract.attach_window_minutes = cli.attach_window.filter(|m| *m > 0);
    }
    if let Some(format) = cli.format.as_deref().and_then(OutputFormat::from_label) {
        opts.format = format;
    }
    opts.write_roster = cli.write_roster;

    opts.filter.add_statuses(&cli.status)?;
    opts.filter.add_categories(&cli.category);
    opts.filter.add_reporters(&cli.reporter);
    opts.filter.set_date_range(cli.from.as_deref(), cli.to.as_deref())?;

    Ok(opts)
}

fn run(cli: Cli) -> Result<(), SupportLensError> {
    let (app_config, warnings) = match load_app_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            // Logging is not up yet; fall back to defaults for the subscriber.
            logging::init(cli.debug, None, None);
            return Err(e);
        }
    };

    logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );

    tracing::info!(
        app = constants::APP_NAME,
        version = constants::APP_VERSION,
        debug = cli.debug,
        "Starting"
    );
    for warning in &warnings {
        tracing::warn!(warning = %warning, "Configuration warning");
    }

    let quiet = cli.quiet;
    let opts = build_options(cli, &app_config)?;
    let summary = pipeline::run(&opts)?;

    if !quiet {
        println!("{}", summary.report);
        println!("Files written:");
        for path in &summary.written {
            println!("  {}", path.display());
        }
    }

    tracing::info!(
        issues = summary.issues_total,
        selected = summary.issues_selected,
        files = summary.written.len(),
        "Analysis complete"
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "Analysis failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
