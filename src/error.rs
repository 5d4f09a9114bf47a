//! Error types surfaced by the throttled transport, the admission gate, and response hooks.

// self
use crate::_prelude::*;

/// Boxed error used by custom response hooks that substitute their own failure.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error returned by [`RateLimitedTransport`](crate::transport::RateLimitedTransport).
///
/// `E` is the wrapped transport's own error type. Transport failures travel through
/// [`Error::Transport`] untouched, so callers see the same error shape they would get from the
/// bare transport plus the throttling-specific variants below.
#[derive(Debug, ThisError)]
pub enum Error<E> {
	/// The request context ended before the admission gate granted a token.
	///
	/// The request was never handed to the inner transport.
	#[error(transparent)]
	Canceled(#[from] CancelError),
	/// Failure reported by the inner transport, passed through verbatim.
	#[error(transparent)]
	Transport(E),
	/// A rate-limit header was present but did not hold a non-negative integer.
	#[error(transparent)]
	HeaderParse(#[from] HeaderParseError),
	/// A custom response hook replaced the round trip outcome with its own error.
	#[error("Response hook rejected the round trip.")]
	Hook {
		/// Error supplied by the hook.
		#[source]
		source: BoxError,
	},
}
impl<E> Error<E> {
	/// Wraps a custom hook failure.
	pub fn hook(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Hook { source: Box::new(src) }
	}

	/// Returns `true` when the request was canceled before admission.
	pub fn is_canceled(&self) -> bool {
		matches!(self, Self::Canceled(_))
	}

	/// Returns `true` when the inner transport reported the failure.
	pub fn is_transport(&self) -> bool {
		matches!(self, Self::Transport(_))
	}

	/// Returns `true` when rate-limit header parsing failed.
	pub fn is_header_parse(&self) -> bool {
		matches!(self, Self::HeaderParse(_))
	}

	/// Returns the inner transport error, if that is what this error carries.
	pub fn into_transport(self) -> Option<E> {
		match self {
			Self::Transport(e) => Some(e),
			_ => None,
		}
	}
}

/// Why an admission wait stopped before a token was granted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ThisError)]
pub enum CancelError {
	/// The context's cancellation token fired.
	#[error("Request was canceled before admission.")]
	Canceled,
	/// The context's deadline elapsed.
	#[error("Request deadline elapsed before admission.")]
	DeadlineExceeded,
}

/// A `RateLimit-*` header carried a value that is not a non-negative integer.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Rate limit header `{header}` carries an invalid value: {value:?}.")]
pub struct HeaderParseError {
	/// Header name as configured for lookup.
	pub header: String,
	/// Raw header value (lossily decoded when not valid UTF-8).
	pub value: String,
}

/// Construction-time validation failures.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum ConfigError {
	/// Refill rate was negative, NaN, or infinite.
	#[error("Refill rate must be a finite, non-negative number of tokens per second, got {rate}.")]
	InvalidRate {
		/// Rejected rate value.
		rate: f64,
	},
	/// Burst capacity was zero.
	#[error("Burst size must be at least one token.")]
	ZeroBurst,
}
