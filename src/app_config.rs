//! Config file loading for CLI defaults.
//!
//! The file is a flat list of `key = value` lines. Strings are double-quoted,
//! `#` starts a comment outside of strings, and unknown keys are rejected.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// File configuration for bulkdl defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default file scanned for links.
    pub input_file: Option<PathBuf>,
    /// Default download root.
    pub output_folder: Option<PathBuf>,
    /// Default log file.
    pub log_file: Option<PathBuf>,
    /// Default history database.
    pub db_file: Option<PathBuf>,
    /// Default concurrency (0 = number of CPUs).
    pub threads: Option<u16>,
    /// Default attempts per file.
    pub attempts: Option<u32>,
    /// Retry until success or interruption.
    pub disable_attempt_limit: Option<bool>,
    /// Add the album ID to album folder names.
    pub include_id: Option<bool>,
    /// Skip video files.
    pub exclude_videos: Option<bool>,
    /// Skip image files.
    pub exclude_images: Option<bool>,
    /// Skip audio files.
    pub exclude_audio: Option<bool>,
    /// Skip files of no known media category.
    pub exclude_other: Option<bool>,
    /// Per-attempt timeout in seconds.
    pub attempt_timeout_secs: Option<u64>,
    /// Identify files by URL alone.
    pub fingerprint_url_only: Option<bool>,
    /// Keep downloading when the history database fails.
    pub tolerate_store_errors: Option<bool>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(threads) = self.threads
            && threads > 100
        {
            bail!("Invalid config value for `threads`: {threads}. Expected range: 0..=100");
        }
        if let Some(attempts) = self.attempts
            && attempts == 0
        {
            bail!("Invalid config value for `attempts`: 0. Expected a value of at least 1");
        }
        if let Some(timeout) = self.attempt_timeout_secs
            && !(1..=86_400).contains(&timeout)
        {
            bail!(
                "Invalid config value for `attempt_timeout_secs`: {timeout}. Expected range: 1..=86400"
            );
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Path the config was looked up at, if any.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/bulkdl/config.toml`
/// 2. `$HOME/.config/bulkdl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("bulkdl")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("bulkdl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config named by `--config`, or the default file if present.
///
/// An explicit path must exist; a missing default file is not an error.
pub fn load_file_config_for(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig::default());
    };
    if !path_ref.exists() {
        return Ok(LoadedConfig { path, config: None });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "input_file" => {
                cfg.input_file = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "output_folder" => {
                cfg.output_folder = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "log_file" => {
                cfg.log_file = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "db_file" => {
                cfg.db_file = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "threads" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let threads = u16::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("threads out of range for u16"))?;
                cfg.threads = Some(threads);
            }
            "attempts" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let attempts = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("attempts out of range for u32"))?;
                cfg.attempts = Some(attempts);
            }
            "disable_attempt_limit" => {
                cfg.disable_attempt_limit = Some(parse_boolean(value).with_context(invalid)?);
            }
            "include_id" => {
                cfg.include_id = Some(parse_boolean(value).with_context(invalid)?);
            }
            "exclude_videos" => {
                cfg.exclude_videos = Some(parse_boolean(value).with_context(invalid)?);
            }
            "exclude_images" => {
                cfg.exclude_images = Some(parse_boolean(value).with_context(invalid)?);
            }
            "exclude_audio" => {
                cfg.exclude_audio = Some(parse_boolean(value).with_context(invalid)?);
            }
            "exclude_other" => {
                cfg.exclude_other = Some(parse_boolean(value).with_context(invalid)?);
            }
            "attempt_timeout_secs" => {
                cfg.attempt_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "fingerprint_url_only" => {
                cfg.fingerprint_url_only = Some(parse_boolean(value).with_context(invalid)?);
            }
            "tolerate_store_errors" => {
                cfg.tolerate_store_errors = Some(parse_boolean(value).with_context(invalid)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
