//! Admission gate contract and the refill-rate value type.

pub mod bucket;

pub use bucket::TokenBucket;

// self
use crate::{
	_prelude::*,
	error::{CancelError, ConfigError},
};

/// Boxed future returned by [`AdmissionGate::wait`].
pub type GateFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CancelError>> + 'a + Send>>;

/// Token-bucket admission capability consumed by the throttled transport.
///
/// Implementations serialize their own token accounting; the transport only ever calls
/// [`wait`](AdmissionGate::wait) and [`set_rate`](AdmissionGate::set_rate). Rate changes must be
/// observed by every waiter, including ones already parked, as soon as `set_rate` returns.
pub trait AdmissionGate
where
	Self: Send + Sync,
{
	/// Waits until one token can be consumed or `ctx` ends.
	///
	/// Waiters are admitted in arrival order. A context that ends first yields its
	/// [`CancelError`] and consumes nothing.
	fn wait<'a>(&'a self, ctx: &'a RequestContext) -> GateFuture<'a>;

	/// Replaces the refill rate for current and future waiters.
	fn set_rate(&self, rate: Rate);

	/// Current refill rate.
	fn rate(&self) -> Rate;

	/// Maximum number of tokens the gate can hold.
	fn burst(&self) -> u32;
}

/// Refill rate in tokens per second.
///
/// Always finite and non-negative. A zero rate admits whatever burst is left and then parks
/// waiters until the rate is raised.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Rate(f64);
impl Rate {
	/// Zero tokens per second.
	pub const ZERO: Self = Self(0.);

	/// Validates `tokens` per second.
	pub fn per_second(tokens: f64) -> Result<Self, ConfigError> {
		if tokens.is_finite() && tokens >= 0. {
			// Normalize `-0.0`.
			Ok(Self(tokens.max(0.)))
		} else {
			Err(ConfigError::InvalidRate { rate: tokens })
		}
	}

	/// Raw tokens-per-second value.
	pub const fn as_f64(self) -> f64 {
		self.0
	}

	/// Returns `true` for a rate that never refills.
	pub fn is_zero(self) -> bool {
		self.0 == 0.
	}

	/// Time needed to accumulate `tokens` at this rate, or `None` if that never happens.
	pub(crate) fn time_to_accumulate(self, tokens: f64) -> Option<Duration> {
		if self.is_zero() {
			return None;
		}

		Duration::try_from_secs_f64(tokens / self.0).ok()
	}
}
impl TryFrom<f64> for Rate {
	type Error = ConfigError;

	fn try_from(value: f64) -> Result<Self, Self::Error> {
		Self::per_second(value)
	}
}
impl From<Rate> for f64 {
	fn from(value: Rate) -> Self {
		value.0
	}
}
impl Display for Rate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/s", self.0)
	}
}

/// Serializable limiter settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
	/// Initial refill rate in tokens per second.
	pub rate: Rate,
	/// Maximum burst size; must be at least one.
	pub burst: u32,
}
