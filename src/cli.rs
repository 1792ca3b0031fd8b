//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use bulkdl_core::download::constants::DEFAULT_ATTEMPT_LIMIT;

/// Default file scanned for links.
pub const DEFAULT_INPUT_FILE: &str = "URLs.txt";
/// Default download root.
pub const DEFAULT_OUTPUT_FOLDER: &str = "Downloads";
/// Default log file, truncated on every run.
pub const DEFAULT_LOG_FILE: &str = "downloader.log";
/// Default download history database.
pub const DEFAULT_DB_FILE: &str = "download_history.sqlite";
/// `--log-file` value that sends log records to stderr.
pub const LOG_TO_STDERR: &str = "-";

/// Bulk download files from a list of direct links.
///
/// Links are taken from the arguments and from every http(s) URL found in the
/// input file. Files already recorded in the download history are skipped.
#[derive(Parser, Debug, Clone)]
#[command(name = "bulkdl")]
#[command(author, version, about)]
#[command(after_help = "Exit codes: 0 = all downloaded, 2 = some failed, 1 = nothing downloaded or interrupted")]
pub struct Args {
    /// Links to download, in addition to those in the input file
    #[arg(value_name = "LINK")]
    pub links: Vec<String>,

    /// File to scan for links (created if missing)
    #[arg(short = 'i', long, value_name = "FILE", default_value = DEFAULT_INPUT_FILE)]
    pub input_file: PathBuf,

    /// Folder downloads are written to
    #[arg(short = 'o', long, value_name = "DIR", default_value = DEFAULT_OUTPUT_FOLDER)]
    pub output_folder: PathBuf,

    /// Log file, truncated on every run ("-" logs to stderr)
    #[arg(long, value_name = "FILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Download history database
    #[arg(long, value_name = "FILE", default_value = DEFAULT_DB_FILE)]
    pub db_file: PathBuf,

    /// Maximum concurrent downloads (0 = number of CPUs, max 100)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u16).range(0..=100))]
    pub threads: u16,

    /// Attempts per file before giving up (1 or more)
    #[arg(long, default_value_t = DEFAULT_ATTEMPT_LIMIT, value_parser = clap::value_parser!(u32).range(1..))]
    pub attempts: u32,

    /// Retry failed downloads until they succeed or the run is interrupted
    #[arg(long)]
    pub disable_attempt_limit: bool,

    /// Add the album ID to album folder names
    #[arg(long)]
    pub include_id: bool,

    /// Skip video files
    #[arg(long)]
    pub exclude_videos: bool,

    /// Skip image files
    #[arg(long)]
    pub exclude_images: bool,

    /// Skip audio files
    #[arg(long)]
    pub exclude_audio: bool,

    /// Skip files that are not video, image or audio
    #[arg(long)]
    pub exclude_other: bool,

    /// Abort a single attempt after this many seconds (1-86400)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=86_400))]
    pub attempt_timeout: Option<u64>,

    /// Identify files by URL alone instead of URL and size
    #[arg(long)]
    pub fingerprint_url_only: bool,

    /// Keep downloading when the history database fails
    #[arg(long)]
    pub tolerate_store_errors: bool,

    /// Re-download files that already exist on disk
    #[arg(long)]
    pub overwrite: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Read defaults from this config file instead of the default location
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Returns the log file path, or `None` when logging to stderr.
    pub fn log_target(&self) -> Option<&std::path::Path> {
        (self.log_file.as_os_str() != LOG_TO_STDERR).then_some(self.log_file.as_path())
    }
}
