//! Advisory retry decisions for transport failures.
//!
//! Nothing in this module retries on its own. A caller-owned retry loop asks
//! a [`RetryStrategy`] whether, and after how long, a failed call may be
//! resubmitted. Strategies consult an [`EligibilityStrategy`], by default the
//! data-driven table behind [`is_retryable`].

mod eligibility;
mod strategy;
#[cfg(test)]
mod tests;

pub use eligibility::*;
pub use strategy::*;
