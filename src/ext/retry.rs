//! Retry policy contracts for callers that want to re-attempt failed broker calls.

// self
use crate::_prelude::*;

/// Context shared with a [`RetryPolicy`] after a call failed.
#[derive(Clone, Copy, Debug)]
pub struct RetryContext<'a> {
	/// Number of attempts made so far (the failed one included).
	pub attempt: u32,
	/// Error returned by the last attempt.
	pub error: &'a Error,
	/// Timestamp the caller observed before invoking the policy.
	pub observed_at: OffsetDateTime,
}
impl<'a> RetryContext<'a> {
	/// Creates a context for the `attempt`-th failure.
	pub fn new(attempt: u32, error: &'a Error) -> Self {
		Self { attempt, error, observed_at: OffsetDateTime::now_utc() }
	}
}

/// Result emitted by a [`RetryPolicy`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryDecision {
	/// Surface the error to the user.
	GiveUp,
	/// Try again once the directive allows it.
	Retry(RetryDirective),
}

/// Advises callers when to retry after a [`RetryDecision::Retry`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when it is safe to retry.
	pub earliest_retry_at: OffsetDateTime,
	/// Suggested backoff duration.
	pub recommended_backoff: Duration,
}

/// Decides whether a failed call should be attempted again.
pub trait RetryPolicy
where
	Self: Send + Sync,
{
	/// Evaluates the failure described by `context`.
	fn decide(&self, context: &RetryContext<'_>) -> RetryDecision;
}

/// Never retries. This is the broker's default behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRetry;
impl RetryPolicy for NoRetry {
	fn decide(&self, _context: &RetryContext<'_>) -> RetryDecision {
		RetryDecision::GiveUp
	}
}

/// Retries retryable errors with exponential backoff, honoring upstream `Retry-After` hints.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
	/// Total attempts allowed, the first one included.
	pub max_attempts: u32,
	/// Delay before the second attempt; doubled for every further attempt.
	pub base_delay: Duration,
	/// Upper bound for a single delay.
	pub max_delay: Duration,
}
impl Default for ExponentialBackoff {
	fn default() -> Self {
		Self { max_attempts: 3, base_delay: Duration::seconds(1), max_delay: Duration::seconds(30) }
	}
}
impl RetryPolicy for ExponentialBackoff {
	fn decide(&self, context: &RetryContext<'_>) -> RetryDecision {
		if context.attempt >= self.max_attempts || !context.error.is_retryable() {
			return RetryDecision::GiveUp;
		}

		let exponent = context.attempt.saturating_sub(1).min(16);
		let backoff = context
			.error
			.retry_after()
			.unwrap_or_else(|| self.base_delay.saturating_mul(1 << exponent))
			.min(self.max_delay);

		RetryDecision::Retry(RetryDirective {
			earliest_retry_at: context.observed_at + backoff,
			recommended_backoff: backoff,
		})
	}
}
