//! Closed-loop refill-rate adaptation from `RateLimit-*` response headers.
//!
//! After each successful round trip [`HeaderAdaptation`] reads the server's remaining quota and
//! the seconds left in the current window, then retunes the shared gate so the remaining quota is
//! spread evenly over that window. Header names follow
//! [draft-polli-ratelimit-headers-02](https://www.ietf.org/archive/id/draft-polli-ratelimit-headers-02.html).

// crates.io
use http::HeaderValue;
// self
use crate::{
	_prelude::*,
	error::HeaderParseError,
	limiter::{AdmissionGate, Rate},
	obs::{self, SendOutcome},
	transport::{ResponseHeaders, ResponseHook, TransportMetrics},
};

/// Default header carrying the remaining request quota.
pub const REMAINING_HEADER: &str = "ratelimit-remaining";
/// Default header carrying the seconds until the quota resets.
pub const RESET_HEADER: &str = "ratelimit-reset";

/// How `remaining ÷ reset` is turned into a refill rate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateDivision {
	/// Fractional tokens per second (`1 ÷ 10 = 0.1`).
	#[default]
	Exact,
	/// Integer division (`1 ÷ 10 = 0`), which stalls the gate until the next adaptation.
	Truncated,
}

/// Settings for [`HeaderAdaptation`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
	/// Header carrying the remaining quota (matched case-insensitively).
	pub remaining_header: String,
	/// Header carrying the seconds until reset (matched case-insensitively).
	pub reset_header: String,
	/// Rate computation mode.
	pub division: RateDivision,
}
impl Default for AdaptationConfig {
	fn default() -> Self {
		Self {
			remaining_header: REMAINING_HEADER.into(),
			reset_header: RESET_HEADER.into(),
			division: RateDivision::default(),
		}
	}
}

/// Quota feedback parsed from a single response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitFeedback {
	/// Requests left in the current window.
	pub remaining: u64,
	/// Seconds until the window resets.
	pub reset: u64,
	/// When the headers were read.
	pub observed_at: OffsetDateTime,
}
impl RateLimitFeedback {
	/// Reads both headers.
	///
	/// Returns `Ok(None)` when either header is absent or empty. A present header that is not a
	/// non-negative integer is an error; both headers are validated before anything is returned.
	pub fn parse(
		headers: &HeaderMap,
		config: &AdaptationConfig,
	) -> Result<Option<Self>, HeaderParseError> {
		let remaining = lookup(headers, &config.remaining_header);
		let reset = lookup(headers, &config.reset_header);
		let (Some(remaining), Some(reset)) = (remaining, reset) else {
			return Ok(None);
		};

		Ok(Some(Self {
			remaining: parse_count(&config.remaining_header, remaining)?,
			reset: parse_count(&config.reset_header, reset)?,
			observed_at: OffsetDateTime::now_utc(),
		}))
	}

	/// Rate that spreads the remaining quota evenly across the window, or `None` for a zero
	/// window.
	pub fn rate(&self, division: RateDivision) -> Option<Rate> {
		if self.reset == 0 {
			return None;
		}

		let tokens = match division {
			RateDivision::Exact => self.remaining as f64 / self.reset as f64,
			RateDivision::Truncated => (self.remaining / self.reset) as f64,
		};

		Rate::per_second(tokens).ok()
	}

	/// Instant the server's window resets, if it is representable.
	pub fn resets_at(&self) -> Option<OffsetDateTime> {
		let reset = time::Duration::seconds(i64::try_from(self.reset).ok()?);

		self.observed_at.checked_add(reset)
	}
}

/// Built-in [`ResponseHook`] that retunes the gate from `RateLimit-*` headers.
///
/// The hook holds a weak reference to the gate: it never keeps a gate alive, and once the gate is
/// gone responses pass through untouched. It keeps no state between calls.
#[derive(Clone)]
pub struct HeaderAdaptation {
	gate: Weak<dyn AdmissionGate>,
	config: AdaptationConfig,
	metrics: Option<Arc<TransportMetrics>>,
}
impl HeaderAdaptation {
	/// Binds a hook with default settings to `gate`.
	pub fn new<G>(gate: &Arc<G>) -> Self
	where
		G: 'static + AdmissionGate,
	{
		let gate = Arc::downgrade(gate);

		Self::bound(gate, AdaptationConfig::default())
	}

	/// Overrides the settings.
	pub fn with_config(mut self, config: AdaptationConfig) -> Self {
		self.config = config;

		self
	}

	/// Active settings.
	pub fn config(&self) -> &AdaptationConfig {
		&self.config
	}

	pub(crate) fn bound(gate: Weak<dyn AdmissionGate>, config: AdaptationConfig) -> Self {
		Self { gate, config, metrics: None }
	}

	pub(crate) fn with_metrics(mut self, metrics: Arc<TransportMetrics>) -> Self {
		self.metrics = Some(metrics);

		self
	}

	/// Applies header feedback to `gate`, returning the new rate when one was set.
	fn adapt(
		&self,
		gate: &dyn AdmissionGate,
		headers: &HeaderMap,
	) -> Result<Option<Rate>, HeaderParseError> {
		let feedback = match RateLimitFeedback::parse(headers, &self.config) {
			Ok(feedback) => feedback,
			Err(e) => {
				if let Some(metrics) = &self.metrics {
					metrics.record_adaptation_failure();
				}

				obs::record_header_parse_failure(&e);

				return Err(e);
			},
		};
		let Some(rate) = feedback.and_then(|feedback| feedback.rate(self.config.division)) else {
			return Ok(None);
		};

		gate.set_rate(rate);

		if let Some(metrics) = &self.metrics {
			metrics.record_adapted();
		}

		obs::record_send_outcome(SendOutcome::Adapted);

		Ok(Some(rate))
	}
}
impl<R, E> ResponseHook<R, E> for HeaderAdaptation
where
	R: ResponseHeaders,
{
	fn inspect(&self, outcome: Result<R, Error<E>>) -> Result<R, Error<E>> {
		let response = outcome?;
		let Some(gate) = self.gate.upgrade() else {
			return Ok(response);
		};

		self.adapt(gate.as_ref(), response.headers())?;

		Ok(response)
	}
}
impl Debug for HeaderAdaptation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HeaderAdaptation")
			.field("config", &self.config)
			.field("gate_bound", &(self.gate.strong_count() > 0))
			.finish()
	}
}

fn lookup<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a HeaderValue> {
	headers.get(name).filter(|value| !value.as_bytes().trim_ascii().is_empty())
}

fn parse_count(header: &str, value: &HeaderValue) -> Result<u64, HeaderParseError> {
	value.to_str().ok().and_then(|raw| raw.trim().parse::<u64>().ok()).ok_or_else(|| {
		HeaderParseError {
			header: header.to_owned(),
			value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
		}
	})
}
