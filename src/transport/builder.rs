// self
use crate::{
	_prelude::*,
	adapt::{AdaptationConfig, HeaderAdaptation},
	limiter::AdmissionGate,
	transport::{RateLimitedTransport, ResponseHeaders, ResponseHook, Transport, TransportMetrics},
};

/// Builder for [`RateLimitedTransport`] values.
///
/// Each option is applied in call order. Only one response hook is active at a time, so a later
/// [`response_hook`](Self::response_hook) or [`header_adaptation`](Self::header_adaptation) call
/// replaces whatever an earlier one installed.
pub struct RateLimitedTransportBuilder<T>
where
	T: ?Sized + Transport,
{
	inner: Arc<T>,
	gate: Arc<dyn AdmissionGate>,
	hook: Option<Arc<dyn ResponseHook<T::Response, T::Error>>>,
	metrics: Arc<TransportMetrics>,
}
impl<T> RateLimitedTransportBuilder<T>
where
	T: ?Sized + Transport,
{
	pub(crate) fn new(inner: Arc<T>, gate: Arc<dyn AdmissionGate>) -> Self {
		Self { inner, gate, hook: None, metrics: Default::default() }
	}

	/// Installs a custom response hook.
	pub fn response_hook<H>(mut self, hook: H) -> Self
	where
		H: 'static + ResponseHook<T::Response, T::Error>,
	{
		self.hook = Some(Arc::new(hook));

		self
	}

	/// Removes any previously installed hook.
	pub fn without_hook(mut self) -> Self {
		self.hook = None;

		self
	}

	/// Consumes the builder.
	pub fn build(self) -> RateLimitedTransport<T> {
		RateLimitedTransport {
			inner: self.inner,
			gate: self.gate,
			hook: self.hook,
			metrics: self.metrics,
		}
	}
}
impl<T> RateLimitedTransportBuilder<T>
where
	T: ?Sized + Transport,
	T::Response: ResponseHeaders,
{
	/// Installs the built-in `RateLimit-Remaining` / `RateLimit-Reset` adaptation hook, bound to
	/// this transport's gate.
	pub fn header_adaptation(self) -> Self {
		self.header_adaptation_with(AdaptationConfig::default())
	}

	/// Same as [`header_adaptation`](Self::header_adaptation) with custom header names or
	/// division mode.
	pub fn header_adaptation_with(mut self, config: AdaptationConfig) -> Self {
		let adaptation = HeaderAdaptation::bound(Arc::downgrade(&self.gate), config)
			.with_metrics(Arc::clone(&self.metrics));

		self.hook = Some(Arc::new(adaptation));

		self
	}
}
impl<T> Debug for RateLimitedTransportBuilder<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimitedTransportBuilder")
			.field("hook_set", &self.hook.is_some())
			.finish()
	}
}
