// SupportLens - platform/config.rs
//
// Platform-specific directory resolution and config.toml loading with
// startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for SupportLens configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/supportlens/).
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub input: InputSection,
    pub grouping: GroupingSection,
    pub classifier: ClassifierSection,
    pub roster: RosterSection,
    pub output: OutputSection,
    pub logging: LoggingSection,
}

/// `[input]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct InputSection {
    /// Refuse input files larger than this many MiB.
    pub max_file_size_mb: Option<u64>,
    /// Truncate message bodies longer than this many bytes.
    pub max_body_bytes: Option<usize>,
}

/// `[grouping]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct GroupingSection {
    /// "per-sender", "single" or "concurrent".
    pub policy: Option<String>,
    /// "most-recent" or "oldest".
    pub fallback: Option<String>,
    /// Fallback attach window in minutes.
    pub attach_window_minutes: Option<i64>,
}

/// `[classifier]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    /// User rule file overlaid on the built-in rules.
    pub rules_file: Option<String>,
}

/// `[roster]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RosterSection {
    /// Member roster JSON file.
    pub file: Option<String>,
    /// Guess roles for senders missing from the roster.
    pub auto_classify: Option<bool>,
}

/// `[output]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: Option<String>,
    /// "csv", "json" or "both".
    pub format: Option<String>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// All values are validated against named constants at load time.
/// Invalid values produce actionable warnings and fall back to defaults.
/// Names (policy, fallback, format) are kept as validated labels; the app
/// layer maps them onto core types.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    // -- Input --
    pub max_input_size: u64,
    pub max_body_size: usize,

    // -- Grouping --
    pub policy: String,
    pub fallback: String,
    pub attach_window_minutes: Option<i64>,

    // -- Classifier / roster --
    pub rules_file: Option<PathBuf>,
    pub roster_file: Option<PathBuf>,
    pub auto_classify: bool,

    // -- Output --
    pub output_dir: PathBuf,
    pub output_format: String,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    /// Log file path.
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_input_size: constants::MAX_INPUT_FILE_SIZE,
            max_body_size: constants::MAX_BODY_SIZE,
            policy: constants::GROUPING_POLICIES[0].to_string(),
            fallback: constants::FALLBACK_TARGETS[0].to_string(),
            attach_window_minutes: Some(constants::DEFAULT_ATTACH_WINDOW_MINUTES),
            rules_file: None,
            roster_file: None,
            auto_classify: true,
            output_dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            output_format: constants::DEFAULT_OUTPUT_FORMAT.to_string(),
            log_level: None,
            log_file: None,
        }
    }
}

/// Load and validate config.toml from the platform config directory.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// If the file does not exist, returns defaults with no warnings (first-run).
/// If the file is unreadable or unparseable, returns defaults with a warning
/// so the run still proceeds but the user is informed.
pub fn load_config(config_dir: &Path) -> (AppConfig, Vec<String>) {
    let config_path = config_dir.join(constants::CONFIG_FILE_NAME);

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), Vec::new());
    }

    match load_config_file(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            let msg = format!("{e}. Using defaults.");
            tracing::warn!("{}", msg);
            (AppConfig::default(), vec![msg])
        }
    }
}

/// Load and validate an explicitly named config file.
///
/// Unlike `load_config`, a missing, unreadable or unparseable file is an
/// error: the user asked for this file. Out-of-range values are still
/// warnings.
pub fn load_config_file(config_path: &Path) -> Result<(AppConfig, Vec<String>), ConfigError> {
    let io_err = |e| ConfigError::Io {
        path: config_path.to_path_buf(),
        source: e,
    };

    let size = std::fs::metadata(config_path).map_err(io_err)?.len();
    if size > constants::MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValueOutOfRange {
            field: "config file size".to_string(),
            value: size.to_string(),
            expected: format!("at most {} bytes", constants::MAX_CONFIG_FILE_SIZE),
        });
    }

    let content = std::fs::read_to_string(config_path).map_err(io_err)?;
    let raw: RawConfig = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
        path: config_path.to_path_buf(),
        source: e,
    })?;

    tracing::info!(path = %config_path.display(), "Loaded config.toml");

    let base_dir = config_path.parent().unwrap_or(Path::new("."));
    Ok(validate(raw, base_dir))
}

/// Relative paths in the config file are relative to the file itself.
fn resolve_path(base_dir: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn validate_label(
    section: &str,
    key: &str,
    value: &str,
    valid: &[&str],
    default: &str,
    warnings: &mut Vec<String>,
) -> Option<String> {
    let lower = value.trim().to_lowercase();
    if valid.contains(&lower.as_str()) {
        Some(lower)
    } else {
        warnings.push(format!(
            "[{section}] {key} = \"{value}\" is not recognised. Valid values: {}. Using default ({default}).",
            valid.join(", "),
        ));
        None
    }
}

/// Validate each field against named constants, accumulating all warnings.
pub fn validate(raw: RawConfig, base_dir: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();
    let mut config = AppConfig::default();

    // -- Input: max_file_size_mb --
    if let Some(mb) = raw.input.max_file_size_mb {
        if (constants::MIN_INPUT_FILE_SIZE_MB..=constants::ABSOLUTE_MAX_INPUT_FILE_SIZE_MB)
            .contains(&mb)
        {
            config.max_input_size = mb * 1024 * 1024;
        } else {
            warnings.push(format!(
                "[input] max_file_size_mb = {mb} is out of range ({}-{}). Using default ({}).",
                constants::MIN_INPUT_FILE_SIZE_MB,
                constants::ABSOLUTE_MAX_INPUT_FILE_SIZE_MB,
                constants::MAX_INPUT_FILE_SIZE / (1024 * 1024),
            ));
        }
    }

    // -- Input: max_body_bytes --
    if let Some(bytes) = raw.input.max_body_bytes {
        if (constants::MIN_BODY_SIZE..=constants::ABSOLUTE_MAX_BODY_SIZE).contains(&bytes) {
            config.max_body_size = bytes;
        } else {
            warnings.push(format!(
                "[input] max_body_bytes = {bytes} is out of range ({}-{}). Using default ({}).",
                constants::MIN_BODY_SIZE,
                constants::ABSOLUTE_MAX_BODY_SIZE,
                constants::MAX_BODY_SIZE,
            ));
        }
    }

    // -- Grouping --
    if let Some(ref policy) = raw.grouping.policy {
        if let Some(p) = validate_label(
            "grouping",
            "policy",
            policy,
            constants::GROUPING_POLICIES,
            constants::GROUPING_POLICIES[0],
            &mut warnings,
        ) {
            config.policy = p;
        }
    }
    if let Some(ref fallback) = raw.grouping.fallback {
        if let Some(f) = validate_label(
            "grouping",
            "fallback",
            fallback,
            constants::FALLBACK_TARGETS,
            constants::FALLBACK_TARGETS[0],
            &mut warnings,
        ) {
            config.fallback = f;
        }
    }
    // 0 switches the window off.
    if let Some(minutes) = raw.grouping.attach_window_minutes {
        if minutes == 0 {
            config.attach_window_minutes = None;
        } else if (1..=constants::MAX_ATTACH_WINDOW_MINUTES).contains(&minutes) {
            config.attach_window_minutes = Some(minutes);
        } else {
            warnings.push(format!(
                "[grouping] attach_window_minutes = {minutes} is out of range (0-{}). Using default ({}).",
                constants::MAX_ATTACH_WINDOW_MINUTES,
                constants::DEFAULT_ATTACH_WINDOW_MINUTES,
            ));
        }
    }

    // -- Classifier / roster --
    if let Some(ref file) = raw.classifier.rules_file {
        if !file.is_empty() {
            config.rules_file = Some(resolve_path(base_dir, file));
        }
    }
    if let Some(ref file) = raw.roster.file {
        if !file.is_empty() {
            config.roster_file = Some(resolve_path(base_dir, file));
        }
    }
    if let Some(auto) = raw.roster.auto_classify {
        config.auto_classify = auto;
    }

    // -- Output --
    if let Some(ref dir) = raw.output.dir {
        if !dir.is_empty() {
            config.output_dir = resolve_path(base_dir, dir);
        }
    }
    if let Some(ref format) = raw.output.format {
        if let Some(f) = validate_label(
            "output",
            "format",
            format,
            constants::OUTPUT_FORMATS,
            constants::DEFAULT_OUTPUT_FORMAT,
            &mut warnings,
        ) {
            config.output_format = f;
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        if constants::LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    // -- Logging: file --
    if let Some(ref file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(file.clone());
        }
    }

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }

    (config, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(toml_text: &str) -> (AppConfig, Vec<String>) {
        let raw: RawConfig = toml::from_str(toml_text).unwrap();
        validate(raw, Path::new("/etc/supportlens"))
    }

    #[test]
    fn test_empty_config_is_default() {
        let (config, warnings) = parse("");
        assert_eq!(config, AppConfig::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_valid_values_applied() {
        let (config, warnings) = parse(
            r#"
[input]
max_file_size_mb = 10
max_body_bytes = 4096

[grouping]
policy = "Concurrent"
fallback = "oldest"
attach_window_minutes = 90

[classifier]
rules_file = "rules.toml"

[roster]
file = "/data/members.json"
auto_classify = false

[output]
format = "csv"

[logging]
level = "DEBUG"
"#,
        );
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(config.max_input_size, 10 * 1024 * 1024);
        assert_eq!(config.max_body_size, 4096);
        assert_eq!(config.policy, "concurrent");
        assert_eq!(config.fallback, "oldest");
        assert_eq!(config.attach_window_minutes, Some(90));
        assert_eq!(
            config.rules_file,
            Some(PathBuf::from("/etc/supportlens/rules.toml"))
        );
        assert_eq!(config.roster_file, Some(PathBuf::from("/data/members.json")));
        assert!(!config.auto_classify);
        assert_eq!(config.output_format, "csv");
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_invalid_values_warn_and_default() {
        let (config, warnings) = parse(
            r#"
[input]
max_body_bytes = 1

[grouping]
policy = "round-robin"
attach_window_minutes = -5

[output]
format = "xlsx"

[logging]
level = "loud"
"#,
        );
        assert_eq!(warnings.len(), 5, "{warnings:?}");
        assert_eq!(config, AppConfig::default());
        assert!(warnings.iter().any(|w| w.contains("round-robin")));
    }

    #[test]
    fn test_attach_window_default_and_disable() {
        let (config, _) = parse("");
        assert_eq!(config.attach_window_minutes, Some(120));

        let (config, warnings) = parse("[grouping]\nattach_window_minutes = 0\n");
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(config.attach_window_minutes, None);
    }

    #[test]
    fn test_missing_default_location_is_silent() {
        let dir = TempDir::new().unwrap();
        let (config, warnings) = load_config(dir.path());
        assert_eq!(config, AppConfig::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unparseable_default_location_warns() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(constants::CONFIG_FILE_NAME), "[grouping\n").unwrap();
        let (config, warnings) = load_config(dir.path());
        assert_eq!(config, AppConfig::default());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_explicit_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_config_file(&missing),
            Err(ConfigError::Io { .. })
        ));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "policy = ").unwrap();
        assert!(matches!(
            load_config_file(&bad),
            Err(ConfigError::TomlParse { .. })
        ));
    }

    #[test]
    fn test_explicit_file_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[output]\ndir = \"out\"\n").unwrap();
        let (config, _) = load_config_file(&path).unwrap();
        assert_eq!(config.output_dir, dir.path().join("out"));
    }
}
