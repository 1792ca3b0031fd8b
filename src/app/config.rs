//! CLI parsing with value sources and config file merging.

use std::time::Duration;

use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};

use bulkdl_core::download::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use bulkdl_core::{
    AttemptLimit, DispatchConfig, ExclusionSet, FingerprintPolicy, RetryPolicy, StorePolicy,
};

use crate::app_config::{FileConfig, VerbositySetting};
use crate::cli::Args;

/// Which arguments were given explicitly on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) input_file: bool,
    pub(crate) output_folder: bool,
    pub(crate) log_file: bool,
    pub(crate) db_file: bool,
    pub(crate) threads: bool,
    pub(crate) attempts: bool,
    pub(crate) disable_attempt_limit: bool,
    pub(crate) include_id: bool,
    pub(crate) exclude_videos: bool,
    pub(crate) exclude_images: bool,
    pub(crate) exclude_audio: bool,
    pub(crate) exclude_other: bool,
    pub(crate) attempt_timeout: bool,
    pub(crate) fingerprint_url_only: bool,
    pub(crate) tolerate_store_errors: bool,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HttpTimeoutSettings {
    pub(crate) connect_secs: u64,
    pub(crate) read_secs: u64,
}

impl Default for HttpTimeoutSettings {
    fn default() -> Self {
        Self {
            connect_secs: CONNECT_TIMEOUT_SECS,
            read_secs: READ_TIMEOUT_SECS,
        }
    }
}

pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = sources_from_matches(&matches);
    (args, sources)
}

fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    CliValueSources {
        input_file: is_commandline_value(matches, "input_file"),
        output_folder: is_commandline_value(matches, "output_folder"),
        log_file: is_commandline_value(matches, "log_file"),
        db_file: is_commandline_value(matches, "db_file"),
        threads: is_commandline_value(matches, "threads"),
        attempts: is_commandline_value(matches, "attempts"),
        disable_attempt_limit: is_commandline_value(matches, "disable_attempt_limit"),
        include_id: is_commandline_value(matches, "include_id"),
        exclude_videos: is_commandline_value(matches, "exclude_videos"),
        exclude_images: is_commandline_value(matches, "exclude_images"),
        exclude_audio: is_commandline_value(matches, "exclude_audio"),
        exclude_other: is_commandline_value(matches, "exclude_other"),
        attempt_timeout: is_commandline_value(matches, "attempt_timeout"),
        fingerprint_url_only: is_commandline_value(matches, "fingerprint_url_only"),
        tolerate_store_errors: is_commandline_value(matches, "tolerate_store_errors"),
        verbose: is_commandline_value(matches, "verbose"),
        quiet: is_commandline_value(matches, "quiet"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

fn apply_path(explicit: bool, target: &mut std::path::PathBuf, value: Option<&std::path::PathBuf>) {
    if !explicit && let Some(value) = value {
        target.clone_from(value);
    }
}

fn apply_value<T: Copy>(explicit: bool, target: &mut T, value: Option<T>) {
    if !explicit && let Some(value) = value {
        *target = value;
    }
}

/// Fills every argument not given on the command line from the config file.
pub(crate) fn apply_config_defaults(
    mut args: Args,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> Args {
    let Some(file_config) = file_config else {
        return args;
    };

    apply_path(cli_sources.input_file, &mut args.input_file, file_config.input_file.as_ref());
    apply_path(
        cli_sources.output_folder,
        &mut args.output_folder,
        file_config.output_folder.as_ref(),
    );
    apply_path(cli_sources.log_file, &mut args.log_file, file_config.log_file.as_ref());
    apply_path(cli_sources.db_file, &mut args.db_file, file_config.db_file.as_ref());

    apply_value(cli_sources.threads, &mut args.threads, file_config.threads);
    apply_value(cli_sources.attempts, &mut args.attempts, file_config.attempts);
    apply_value(
        cli_sources.disable_attempt_limit,
        &mut args.disable_attempt_limit,
        file_config.disable_attempt_limit,
    );
    apply_value(cli_sources.include_id, &mut args.include_id, file_config.include_id);
    apply_value(cli_sources.exclude_videos, &mut args.exclude_videos, file_config.exclude_videos);
    apply_value(cli_sources.exclude_images, &mut args.exclude_images, file_config.exclude_images);
    apply_value(cli_sources.exclude_audio, &mut args.exclude_audio, file_config.exclude_audio);
    apply_value(cli_sources.exclude_other, &mut args.exclude_other, file_config.exclude_other);
    apply_value(
        cli_sources.fingerprint_url_only,
        &mut args.fingerprint_url_only,
        file_config.fingerprint_url_only,
    );
    apply_value(
        cli_sources.tolerate_store_errors,
        &mut args.tolerate_store_errors,
        file_config.tolerate_store_errors,
    );

    if !cli_sources.attempt_timeout && file_config.attempt_timeout_secs.is_some() {
        args.attempt_timeout = file_config.attempt_timeout_secs;
    }

    if !cli_sources.verbose
        && !cli_sources.quiet
        && let Some(verbosity) = file_config.verbosity
    {
        apply_config_verbosity(&mut args, verbosity);
    }

    args
}

fn apply_config_verbosity(args: &mut Args, verbosity: VerbositySetting) {
    match verbosity {
        VerbositySetting::Default => {
            args.quiet = false;
            args.verbose = 0;
        }
        VerbositySetting::Verbose => {
            args.quiet = false;
            args.verbose = 1;
        }
        VerbositySetting::Quiet => {
            args.quiet = true;
            args.verbose = 0;
        }
        VerbositySetting::Debug => {
            args.quiet = false;
            args.verbose = 2;
        }
    }
}

pub(crate) fn resolve_http_timeouts(file_config: Option<&FileConfig>) -> HttpTimeoutSettings {
    let mut settings = HttpTimeoutSettings::default();
    let Some(file_config) = file_config else {
        return settings;
    };
    if let Some(secs) = file_config.connect_timeout_secs {
        settings.connect_secs = secs;
    }
    if let Some(secs) = file_config.read_timeout_secs {
        settings.read_secs = secs;
    }
    settings
}

/// Builds the dispatcher configuration from the merged arguments.
pub(crate) fn dispatch_config(args: &Args) -> DispatchConfig {
    let limit = if args.disable_attempt_limit {
        AttemptLimit::Unbounded
    } else {
        AttemptLimit::Bounded(args.attempts)
    };
    DispatchConfig {
        concurrency: usize::from(args.threads),
        retry_policy: RetryPolicy::with_limit(limit),
        attempt_timeout: args.attempt_timeout.map(Duration::from_secs),
        store_policy: if args.tolerate_store_errors {
            StorePolicy::Degrade
        } else {
            StorePolicy::Strict
        },
        exclusions: exclusions(args),
    }
}

pub(crate) fn exclusions(args: &Args) -> ExclusionSet {
    ExclusionSet {
        videos: args.exclude_videos,
        images: args.exclude_images,
        audio: args.exclude_audio,
        other: args.exclude_other,
    }
}

pub(crate) fn fingerprint_policy(args: &Args) -> FingerprintPolicy {
    if args.fingerprint_url_only {
        FingerprintPolicy::UrlOnly
    } else {
        FingerprintPolicy::UrlAndSize
    }
}
