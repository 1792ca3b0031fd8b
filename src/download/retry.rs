//! Attempt limits and exponential backoff between attempts.
//!
//! Every failed attempt is retryable until the [`AttemptLimit`] is reached;
//! there is no permanent-failure classification. The [`RetryPolicy`] decides
//! whether another attempt is allowed and how long the job must wait before
//! it becomes eligible again.
//!
//! # Example
//!
//! ```
//! use bulkdl_core::download::{AttemptLimit, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::with_limit(AttemptLimit::Bounded(3));
//! match policy.should_retry(1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("attempt {attempt} in {delay:?}");
//!     }
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::fmt;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::constants::DEFAULT_ATTEMPT_LIMIT;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// How many fetch attempts a single descriptor may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptLimit {
    /// At most `n` fetch attempts. `Bounded(0)` behaves as `Bounded(1)`.
    Bounded(u32),
    /// Retry until success or cancellation.
    Unbounded,
}

impl AttemptLimit {
    /// Returns the effective maximum, or `None` when unbounded.
    #[must_use]
    pub fn max_attempts(self) -> Option<u32> {
        match self {
            Self::Bounded(n) => Some(n.max(1)),
            Self::Unbounded => None,
        }
    }

    /// Returns true if a job with `attempts_made` failed attempts may try again.
    #[must_use]
    pub fn allows_another(self, attempts_made: u32) -> bool {
        self.max_attempts().is_none_or(|max| attempts_made < max)
    }
}

impl Default for AttemptLimit {
    fn default() -> Self {
        Self::Bounded(DEFAULT_ATTEMPT_LIMIT)
    }
}

impl fmt::Display for AttemptLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_attempts() {
            Some(max) => write!(f, "{max}"),
            None => f.write_str("unbounded"),
        }
    }
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue the job; it becomes eligible after `delay`.
    Retry {
        /// How long to wait before the job is eligible again.
        delay: Duration,
        /// Which attempt number this will be (first retry is attempt 2).
        attempt: u32,
    },

    /// The job is terminally failed.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry configuration with exponential backoff.
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay) + jitter
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    limit: AttemptLimit,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            limit: AttemptLimit::default(),
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom backoff settings and default jitter.
    #[must_use]
    pub fn new(
        limit: AttemptLimit,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            limit,
            base_delay,
            max_delay,
            backoff_multiplier,
            max_jitter: MAX_JITTER,
        }
    }

    /// Creates a policy with a custom limit and default backoff.
    #[must_use]
    pub fn with_limit(limit: AttemptLimit) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Creates a policy that retries without any delay.
    #[must_use]
    pub fn immediate(limit: AttemptLimit) -> Self {
        Self {
            limit,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            max_jitter: Duration::ZERO,
        }
    }

    /// Returns the configured attempt limit.
    #[must_use]
    pub fn limit(&self) -> AttemptLimit {
        self.limit
    }

    /// Decides what happens after the `attempts_made`-th failed attempt.
    #[instrument(skip(self), fields(limit = %self.limit))]
    pub fn should_retry(&self, attempts_made: u32) -> RetryDecision {
        if !self.limit.allows_another(attempts_made) {
            debug!(attempts_made, "attempt limit reached");
            return RetryDecision::DoNotRetry {
                reason: format!("attempt limit ({}) exhausted", self.limit),
            };
        }

        let delay = self.calculate_delay(attempts_made);
        debug!(
            attempts_made,
            next_attempt = attempts_made.saturating_add(1),
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempts_made.saturating_add(1),
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn calculate_delay(&self, attempts_made: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);
        let exponent = f64::from(attempts_made.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let cap = self.max_jitter.as_millis() as u64;
        if cap == 0 {
            return Duration::ZERO;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=cap);
        Duration::from_millis(jitter_ms)
    }
}
