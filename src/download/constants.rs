//! Constants for the download module (timeouts, partial-file marker, limits).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout between body chunks (5 minutes for slow hosts).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Suffix appended to a destination file name while it is being written.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Default number of attempts per descriptor.
pub const DEFAULT_ATTEMPT_LIMIT: u32 = 10;

/// Maximum allowed explicit concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Concurrency used when host parallelism cannot be determined.
pub const FALLBACK_CONCURRENCY: usize = 4;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("bulkdl/", env!("CARGO_PKG_VERSION"));
