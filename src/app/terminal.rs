use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::cli::Args;

pub(crate) fn no_color_env_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty())
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_use_spinner(
    stderr_is_terminal: bool,
    quiet: bool,
    json: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !json && !dumb_terminal
}

/// Log level implied by `-v`/`-q` (or the config verbosity).
pub(crate) fn default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Installs the global subscriber.
///
/// With `log_file` set, records go to that file, truncated first and
/// without ANSI colors. Otherwise they go to stderr. `RUST_LOG` wins over
/// `default_level` unless `force_cli_level` is set.
pub(crate) fn init_tracing(
    default_level: &str,
    force_cli_level: bool,
    log_file: Option<&Path>,
) -> Result<()> {
    let filter = if force_cli_level {
        tracing_subscriber::EnvFilter::new(default_level)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
    };

    if let Some(path) = log_file {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create log directory '{}'", parent.display())
            })?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
        let _ = tracing_subscriber::fmt()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(filter)
            .try_init();
    } else {
        let no_color = no_color_env_requested() || is_dumb_terminal();
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_ansi(!no_color)
            .with_env_filter(filter)
            .try_init();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_should_use_spinner_requires_terminal() {
        assert!(should_use_spinner(true, false, false, false));
        assert!(!should_use_spinner(false, false, false, false));
    }

    #[test]
    fn test_should_use_spinner_disabled_by_quiet_json_or_dumb() {
        assert!(!should_use_spinner(true, true, false, false));
        assert!(!should_use_spinner(true, false, true, false));
        assert!(!should_use_spinner(true, false, false, true));
    }

    #[test]
    fn test_default_log_level_from_flags() {
        let args = Args::try_parse_from(["bulkdl"]).unwrap();
        assert_eq!(default_log_level(&args), "info");
        let args = Args::try_parse_from(["bulkdl", "-v"]).unwrap();
        assert_eq!(default_log_level(&args), "debug");
        let args = Args::try_parse_from(["bulkdl", "-vvv"]).unwrap();
        assert_eq!(default_log_level(&args), "trace");
        let args = Args::try_parse_from(["bulkdl", "-q"]).unwrap();
        assert_eq!(default_log_level(&args), "error");
    }
}
