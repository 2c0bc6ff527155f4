// self
use crate::{auth::IdentityMode, obs::FlowOutcome};

/// Records a token acquisition outcome via the global metrics recorder (when enabled).
pub fn record_acquisition(mode: IdentityMode, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"graph_broker_acquisition_total",
			"mode" => mode.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (mode, outcome);
	}
}

/// Records a directory request outcome via the global metrics recorder (when enabled).
pub fn record_directory_request(mode: IdentityMode, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"graph_broker_directory_request_total",
			"mode" => mode.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (mode, outcome);
	}
}
