//! Optional observability helpers for throttled round trips.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `hyperate.send` with a `stage` field, plus
//!   `debug` events on refill-rate changes and `warn` events on malformed rate-limit headers.
//! - Enable `metrics` to increment the `hyperate_send_total` counter for every request stage,
//!   labeled by `outcome`, and to publish the current refill rate on the `hyperate_refill_rate`
//!   gauge.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Stages a throttled request passes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SendOutcome {
	/// Entry to [`RateLimitedTransport::send`](crate::transport::RateLimitedTransport::send).
	Attempt,
	/// The admission gate granted a token.
	Admitted,
	/// The request context ended before admission.
	Canceled,
	/// The inner transport finished the round trip (successfully or not).
	Completed,
	/// Header feedback retuned the refill rate.
	Adapted,
	/// Rate-limit headers were present but malformed.
	AdaptationFailed,
}
impl SendOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			SendOutcome::Attempt => "attempt",
			SendOutcome::Admitted => "admitted",
			SendOutcome::Canceled => "canceled",
			SendOutcome::Completed => "completed",
			SendOutcome::Adapted => "adapted",
			SendOutcome::AdaptationFailed => "adaptation_failed",
		}
	}
}
impl Display for SendOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
