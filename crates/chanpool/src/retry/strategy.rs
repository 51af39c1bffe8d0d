use super::{DefaultEligibilityStrategy, EligibilityStrategy, RetryProps, StatusCode};
use core::{fmt, time::Duration};
use rand::Rng;
use std::{sync::Arc, time::Instant};

/// Computes when, if ever, a failed call should be resubmitted.
pub trait RetryStrategy: Send + Sync {
    /// Returns the delay before the next attempt, or `None` if the call must
    /// not be retried.
    fn determine_when_to_retry(&self, props: &RetryProps<'_>) -> Option<Duration>;

    /// The deadline to apply to the next attempt, given the deadline of the
    /// logical call. `None` keeps the overall deadline.
    fn calculate_retry_deadline(&self, _overall_deadline: Instant) -> Option<Instant> {
        None
    }
}

/// Never retries.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverRetryStrategy;

impl RetryStrategy for NeverRetryStrategy {
    fn determine_when_to_retry(&self, _props: &RetryProps<'_>) -> Option<Duration> {
        None
    }
}

/// Retries eligible calls immediately, up to a fixed number of attempts.
#[derive(Clone)]
pub struct FixedCountRetryStrategy {
    max_attempts: u32,
    eligibility: Arc<dyn EligibilityStrategy>,
}

impl FixedCountRetryStrategy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            eligibility: Arc::new(DefaultEligibilityStrategy),
        }
    }

    #[must_use]
    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            eligibility: Arc::clone(&self.eligibility),
        }
    }

    #[must_use]
    pub fn with_eligibility_strategy<E>(&self, eligibility: E) -> Self
    where
        E: EligibilityStrategy + 'static,
    {
        Self {
            max_attempts: self.max_attempts,
            eligibility: Arc::new(eligibility),
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for FixedCountRetryStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryStrategy for FixedCountRetryStrategy {
    fn determine_when_to_retry(&self, props: &RetryProps<'_>) -> Option<Duration> {
        if !self.eligibility.is_eligible_for_retry(props) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                operation = props.operation,
                status = %props.code,
                "request is not retryable"
            );
            return None;
        }
        if props.attempt_number > self.max_attempts {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                operation = props.operation,
                status = %props.code,
                attempt = props.attempt_number,
                max_attempts = self.max_attempts,
                "exceeded max retry attempts"
            );
            return None;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            operation = props.operation,
            status = %props.code,
            attempt = props.attempt_number,
            max_attempts = self.max_attempts,
            "retrying immediately"
        );
        Some(Duration::ZERO)
    }
}

impl fmt::Debug for FixedCountRetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedCountRetryStrategy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Retries eligible calls with jittered exponential backoff.
///
/// For attempt `n` the base delay is `initial_delay * growth_factor^(n - 1)`,
/// capped at `max_backoff`. The actual delay is drawn uniformly from
/// `[base, 3 * base / growth_factor)`, or is exactly `base` when that range
/// is empty.
#[derive(Clone)]
pub struct ExponentialBackoffRetryStrategy {
    initial_delay: Duration,
    growth_factor: u32,
    max_backoff: Duration,
    eligibility: Arc<dyn EligibilityStrategy>,
}

impl ExponentialBackoffRetryStrategy {
    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_micros(500);
    pub const DEFAULT_GROWTH_FACTOR: u32 = 2;
    pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(8);

    /// A zero `growth_factor` is treated as 1.
    pub fn new(initial_delay: Duration, growth_factor: u32, max_backoff: Duration) -> Self {
        Self {
            initial_delay,
            growth_factor: growth_factor.max(1),
            max_backoff,
            eligibility: Arc::new(DefaultEligibilityStrategy),
        }
    }

    #[must_use]
    pub fn with_initial_delay(&self, initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_growth_factor(&self, growth_factor: u32) -> Self {
        Self {
            growth_factor: growth_factor.max(1),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_max_backoff(&self, max_backoff: Duration) -> Self {
        Self {
            max_backoff,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_eligibility_strategy<E>(&self, eligibility: E) -> Self
    where
        E: EligibilityStrategy + 'static,
    {
        Self {
            eligibility: Arc::new(eligibility),
            ..self.clone()
        }
    }

    /// The un-jittered delay before attempt `attempt_number`.
    pub fn base_delay(&self, attempt_number: u32) -> Duration {
        let exponent = attempt_number.saturating_sub(1);
        self.growth_factor
            .checked_pow(exponent)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }

    /// The exclusive upper bound of the jitter range for a base delay.
    fn jitter_ceiling(&self, base: Duration) -> Duration {
        base.saturating_mul(3) / self.growth_factor
    }
}

impl Default for ExponentialBackoffRetryStrategy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_INITIAL_DELAY,
            Self::DEFAULT_GROWTH_FACTOR,
            Self::DEFAULT_MAX_BACKOFF,
        )
    }
}

impl RetryStrategy for ExponentialBackoffRetryStrategy {
    fn determine_when_to_retry(&self, props: &RetryProps<'_>) -> Option<Duration> {
        if !self.eligibility.is_eligible_for_retry(props) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                operation = props.operation,
                status = %props.code,
                "request is not eligible for retry"
            );
            return None;
        }

        let base = self.base_delay(props.attempt_number);
        let ceiling = self.jitter_ceiling(base);
        let delay = if ceiling > base {
            rand::rng().random_range(base..ceiling)
        } else {
            base
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            attempt = props.attempt_number,
            ?base,
            ?ceiling,
            ?delay,
            "computed backoff delay"
        );
        Some(delay)
    }
}

impl fmt::Debug for ExponentialBackoffRetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoffRetryStrategy")
            .field("initial_delay", &self.initial_delay)
            .field("growth_factor", &self.growth_factor)
            .field("max_backoff", &self.max_backoff)
            .finish_non_exhaustive()
    }
}

/// Retries eligible calls after a jittered fixed delay until the logical
/// call's overall deadline passes.
///
/// Each attempt gets its own, shorter deadline (see
/// [`RetryStrategy::calculate_retry_deadline`]). An attempt that fails with
/// `DEADLINE_EXCEEDED` is retried as long as the overall deadline is still
/// in the future, regardless of eligibility.
///
/// Delays are drawn uniformly from `[0.9, 1.1) * retry_delay_interval`.
#[derive(Clone)]
pub struct FixedTimeoutRetryStrategy {
    retry_timeout: Duration,
    retry_delay_interval: Duration,
    eligibility: Arc<dyn EligibilityStrategy>,
}

impl FixedTimeoutRetryStrategy {
    pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_millis(1000);
    pub const DEFAULT_RETRY_DELAY_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(retry_timeout: Duration, retry_delay_interval: Duration) -> Self {
        Self {
            retry_timeout,
            retry_delay_interval,
            eligibility: Arc::new(DefaultEligibilityStrategy),
        }
    }

    #[must_use]
    pub fn with_retry_timeout(&self, retry_timeout: Duration) -> Self {
        Self {
            retry_timeout,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_retry_delay_interval(&self, retry_delay_interval: Duration) -> Self {
        Self {
            retry_delay_interval,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_eligibility_strategy<E>(&self, eligibility: E) -> Self
    where
        E: EligibilityStrategy + 'static,
    {
        Self {
            eligibility: Arc::new(eligibility),
            ..self.clone()
        }
    }

    pub const fn retry_timeout(&self) -> Duration {
        self.retry_timeout
    }

    pub const fn retry_delay_interval(&self) -> Duration {
        self.retry_delay_interval
    }

    fn jittered_delay(&self) -> Duration {
        self.retry_delay_interval
            .mul_f64(rand::rng().random_range(0.9..1.1))
    }

    fn attempt_timed_out(props: &RetryProps<'_>) -> bool {
        props.attempt_number > 0
            && props.code == StatusCode::DeadlineExceeded
            && props
                .overall_deadline
                .is_some_and(|deadline| deadline > Instant::now())
    }
}

impl Default for FixedTimeoutRetryStrategy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_RETRY_TIMEOUT,
            Self::DEFAULT_RETRY_DELAY_INTERVAL,
        )
    }
}

impl RetryStrategy for FixedTimeoutRetryStrategy {
    fn determine_when_to_retry(&self, props: &RetryProps<'_>) -> Option<Duration> {
        if !Self::attempt_timed_out(props) && !self.eligibility.is_eligible_for_retry(props) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                operation = props.operation,
                status = %props.code,
                "request is not retryable"
            );
            return None;
        }

        let delay = self.jittered_delay();
        #[cfg(feature = "tracing")]
        tracing::debug!(
            operation = props.operation,
            status = %props.code,
            attempt = props.attempt_number,
            ?delay,
            "retrying after fixed delay"
        );
        Some(delay)
    }

    fn calculate_retry_deadline(&self, overall_deadline: Instant) -> Option<Instant> {
        Some((Instant::now() + self.retry_timeout).min(overall_deadline))
    }
}

impl fmt::Debug for FixedTimeoutRetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedTimeoutRetryStrategy")
            .field("retry_timeout", &self.retry_timeout)
            .field("retry_delay_interval", &self.retry_delay_interval)
            .finish_non_exhaustive()
    }
}
