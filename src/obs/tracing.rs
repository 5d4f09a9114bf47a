// self
use crate::{_prelude::*, error::HeaderParseError, limiter::Rate};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedSend<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedSend<F> = F;

/// A span builder used around throttled round trips.
#[derive(Clone, Debug)]
pub struct SendSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl SendSpan {
	/// Creates a new span tagged with the provided stage.
	pub fn new(stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("hyperate.send", stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedSend<Fut>
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

pub(crate) fn trace_rate_change(previous: Rate, current: Rate) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			previous = previous.as_f64(),
			current = current.as_f64(),
			"admission gate refill rate has been updated"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (previous, current);
	}
}

pub(crate) fn trace_header_parse_failure(err: &HeaderParseError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			header = err.header.as_str(),
			value = err.value.as_str(),
			"discarding response with malformed rate limit header"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = err;
	}
}
