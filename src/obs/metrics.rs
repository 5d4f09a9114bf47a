// self
use crate::{
	error::HeaderParseError,
	limiter::Rate,
	obs::{self, SendOutcome},
};

/// Records a request stage via the global metrics recorder (when enabled).
pub fn record_send_outcome(outcome: SendOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("hyperate_send_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Publishes a refill-rate change to the metrics recorder and the tracing layer.
pub fn record_rate_change(previous: Rate, current: Rate) {
	#[cfg(feature = "metrics")]
	{
		metrics::gauge!("hyperate_refill_rate").set(current.as_f64());
	}

	obs::trace_rate_change(previous, current);
}

/// Records a malformed rate-limit header.
pub fn record_header_parse_failure(err: &HeaderParseError) {
	record_send_outcome(SendOutcome::AdaptationFailed);

	obs::trace_header_parse_failure(err);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_send_outcome_noop_without_recorder() {
		record_send_outcome(SendOutcome::Canceled);
		record_rate_change(Rate::ZERO, Rate::ZERO);
	}
}
