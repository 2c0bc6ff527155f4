//! Optional observability helpers for broker flows and directory calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `graph_broker.flow` with the `mode`
//!   (identity) and `stage` (call site) fields, plus events for cache hits, welcome messages,
//!   and walkthrough step outcomes.
//! - Enable `metrics` to increment the `graph_broker_acquisition_total` counter for every
//!   attempt/success/failure/cache hit and `graph_broker_directory_request_total` for every
//!   directory call, both labeled by `mode` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Served from the token cache without contacting the provider.
	CacheHit,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::CacheHit => "cache_hit",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
