// self
use crate::{_prelude::*, auth::IdentityMode};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by broker flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided identity mode + stage.
	pub fn new(mode: IdentityMode, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("graph_broker.flow", mode = mode.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (mode, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event when a token is served from the cache.
pub fn emit_cache_hit(mode: IdentityMode) {
	#[cfg(feature = "tracing")]
	tracing::debug!(mode = mode.as_str(), "serving cached token");
	#[cfg(not(feature = "tracing"))]
	let _ = mode;
}

/// Emits the greeting shown after a delegated sign-in.
pub fn emit_welcome(mode: IdentityMode, message: &str) {
	#[cfg(feature = "tracing")]
	tracing::info!(mode = mode.as_str(), "{message}");
	#[cfg(not(feature = "tracing"))]
	let _ = (mode, message);
}

/// Emits a warning when the delegated sign-in returned an unreadable `id_token`.
pub fn emit_id_token_unreadable(mode: IdentityMode, reason: &str) {
	#[cfg(feature = "tracing")]
	tracing::warn!(mode = mode.as_str(), reason, "ignoring unreadable id_token");
	#[cfg(not(feature = "tracing"))]
	let _ = (mode, reason);
}

/// Emits a failed token acquisition with its rendered source chain.
pub fn emit_acquisition_failure(mode: IdentityMode, chain: &str) {
	#[cfg(feature = "tracing")]
	tracing::warn!(mode = mode.as_str(), error = chain, "token acquisition failed");
	#[cfg(not(feature = "tracing"))]
	let _ = (mode, chain);
}

/// Emits the outcome of a walkthrough step; `failure` carries the rendered error chain.
pub fn emit_step(step: &str, failure: Option<&str>) {
	#[cfg(feature = "tracing")]
	match failure {
		Some(chain) => tracing::error!(step, error = chain, "walkthrough step failed"),
		None => tracing::info!(step, "walkthrough step succeeded"),
	}
	#[cfg(not(feature = "tracing"))]
	let _ = (step, failure);
}

/// Emits a step that never ran because an earlier step aborted the walkthrough.
pub fn emit_step_skipped(step: &str) {
	#[cfg(feature = "tracing")]
	tracing::warn!(step, "walkthrough step skipped");
	#[cfg(not(feature = "tracing"))]
	let _ = step;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn events_noop_without_subscriber() {
		emit_cache_hit(IdentityMode::Application);
		emit_welcome(IdentityMode::DelegatedUser, "Welcome");
		emit_step("tenant details", Some("boom"));
		emit_step_skipped("create user");
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(IdentityMode::Application, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
