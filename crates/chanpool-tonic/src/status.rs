//! Bridging tonic status codes to retry decisions.

use chanpool::{RetryProps, RetryStrategy, StatusCode, is_retryable};
use core::time::Duration;
use tonic::{Code, Status};

/// Converts a tonic [`Code`] to the transport-agnostic [`StatusCode`].
pub fn status_code(code: Code) -> StatusCode {
    StatusCode::try_from(i32::from(code)).unwrap_or(StatusCode::Unknown)
}

/// Whether a call to `method` that failed with `status` may be resubmitted.
pub fn is_retryable_status(status: &Status, method: &str) -> bool {
    is_retryable(status_code(status.code()), method)
}

/// Asks `strategy` when to resubmit a call to `method` that failed with
/// `status` on attempt `attempt_number`.
pub fn retry_delay<S>(
    strategy: &S,
    status: &Status,
    method: &str,
    attempt_number: u32,
) -> Option<Duration>
where
    S: RetryStrategy + ?Sized,
{
    let props = RetryProps::new(status_code(status.code()), method, attempt_number);
    strategy.determine_when_to_retry(&props)
}
