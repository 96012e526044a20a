// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counter incremented once per flow attempt and once per terminal outcome.
pub const FLOW_COUNTER: &str = "cooknet_session_flow_total";

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(FLOW_COUNTER, "flow" => kind.as_str(), "outcome" => outcome.as_str())
			.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records the terminal outcome of a flow result.
pub fn record_result<T, E>(kind: FlowKind, result: &std::result::Result<T, E>) {
	let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

	record_flow_outcome(kind, outcome);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn outcomes_are_recorded_without_a_recorder() {
		record_flow_outcome(FlowKind::Bootstrap, FlowOutcome::Attempt);
		record_result(FlowKind::Refresh, &Err::<(), _>("rejected"));
	}
}
