//! Transport contract and the rate-limited decorator built on top of it.
//!
//! [`Transport`] is the crate's only dependency on an HTTP stack: anything that can turn a
//! request into a response future qualifies. [`RateLimitedTransport`] wraps one, gates every
//! request through a shared [`AdmissionGate`], delegates the round trip, and finally runs an
//! optional [`ResponseHook`]. The decorator is itself a [`Transport`], so layers compose.

/// Builder API for assembling rate-limited transports.
pub mod builder;
/// Per-transport admission and adaptation counters.
pub mod metrics;

pub use builder::*;
pub use metrics::*;

// self
use crate::{
	_prelude::*,
	limiter::AdmissionGate,
	obs::{self, SendOutcome, SendSpan},
};

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a, R, E> = Pin<Box<dyn Future<Output = Result<R, E>> + 'a + Send>>;

/// Abstraction over HTTP transports that perform one round trip per call.
///
/// Implementations must be safe to share across tasks. The context is supplied so transports can
/// abort in-flight work when it ends; doing so is optional and entirely up to the transport.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Outbound request type.
	type Request: Send;
	/// Response type produced by a successful round trip.
	type Response: Send;
	/// Concrete error emitted by the transport.
	type Error: 'static + Send + Sync + StdError;

	/// Performs one round trip.
	fn send<'a>(
		&'a self,
		ctx: &'a RequestContext,
		request: Self::Request,
	) -> TransportFuture<'a, Self::Response, Self::Error>;
}

/// Read access to response headers, required by header-driven hooks.
pub trait ResponseHeaders {
	/// Response header map.
	fn headers(&self) -> &HeaderMap;
}
impl<B> ResponseHeaders for http::Response<B> {
	fn headers(&self) -> &HeaderMap {
		http::Response::headers(self)
	}
}

/// Post-round-trip inspection point.
///
/// A hook receives the raw outcome of every admitted request and returns the outcome the caller
/// will see. It may pass values through, substitute errors, or retune a shared gate as a side
/// effect. Closures with the matching signature implement the trait automatically.
pub trait ResponseHook<R, E>
where
	Self: Send + Sync,
{
	/// Inspects and possibly rewrites a round trip outcome.
	fn inspect(&self, outcome: Result<R, Error<E>>) -> Result<R, Error<E>>;
}
impl<R, E, F> ResponseHook<R, E> for F
where
	F: Send + Sync + Fn(Result<R, Error<E>>) -> Result<R, Error<E>>,
{
	fn inspect(&self, outcome: Result<R, Error<E>>) -> Result<R, Error<E>> {
		self(outcome)
	}
}

/// Transport decorator that throttles requests through an [`AdmissionGate`].
///
/// The inner transport and gate are shared handles set once at construction. Every admitted
/// request consumes exactly one token; requests whose context ends while queued consume none and
/// never reach the inner transport.
pub struct RateLimitedTransport<T>
where
	T: ?Sized + Transport,
{
	inner: Arc<T>,
	gate: Arc<dyn AdmissionGate>,
	hook: Option<Arc<dyn ResponseHook<T::Response, T::Error>>>,
	metrics: Arc<TransportMetrics>,
}
impl<T> RateLimitedTransport<T>
where
	T: ?Sized + Transport,
{
	/// Wraps `inner` with no response hook.
	pub fn new(inner: Arc<T>, gate: Arc<dyn AdmissionGate>) -> Self {
		Self::builder(inner, gate).build()
	}

	/// Starts a builder whose options apply in call order.
	pub fn builder(inner: Arc<T>, gate: Arc<dyn AdmissionGate>) -> RateLimitedTransportBuilder<T> {
		RateLimitedTransportBuilder::new(inner, gate)
	}

	/// Wrapped transport.
	pub fn inner(&self) -> &Arc<T> {
		&self.inner
	}

	/// Shared admission gate.
	pub fn gate(&self) -> &Arc<dyn AdmissionGate> {
		&self.gate
	}

	/// Counters for requests that went through this transport and its clones.
	pub fn metrics(&self) -> &Arc<TransportMetrics> {
		&self.metrics
	}

	/// Returns `true` when a response hook is installed.
	pub fn has_hook(&self) -> bool {
		self.hook.is_some()
	}

	/// Waits for admission, performs the round trip, and runs the response hook.
	///
	/// Fails with [`Error::Canceled`] if `ctx` ends before admission. Transport failures come
	/// back as [`Error::Transport`] unchanged, unless a hook rewrites them.
	pub async fn send(
		&self,
		ctx: &RequestContext,
		request: T::Request,
	) -> Result<T::Response, Error<T::Error>> {
		self.round_trip("send", ctx, request).await
	}

	async fn round_trip(
		&self,
		stage: &'static str,
		ctx: &RequestContext,
		request: T::Request,
	) -> Result<T::Response, Error<T::Error>> {
		SendSpan::new(stage)
			.instrument(async move {
				obs::record_send_outcome(SendOutcome::Attempt);

				if let Err(reason) = self.gate.wait(ctx).await {
					self.metrics.record_canceled();
					obs::record_send_outcome(SendOutcome::Canceled);

					return Err(Error::Canceled(reason));
				}

				self.metrics.record_admitted();
				obs::record_send_outcome(SendOutcome::Admitted);

				let outcome = self.inner.send(ctx, request).await.map_err(Error::Transport);

				self.metrics.record_completed();
				obs::record_send_outcome(SendOutcome::Completed);

				match &self.hook {
					Some(hook) => hook.inspect(outcome),
					None => outcome,
				}
			})
			.await
	}
}
impl<T> Transport for RateLimitedTransport<T>
where
	T: ?Sized + Transport,
{
	type Error = Error<T::Error>;
	type Request = T::Request;
	type Response = T::Response;

	fn send<'a>(
		&'a self,
		ctx: &'a RequestContext,
		request: Self::Request,
	) -> TransportFuture<'a, Self::Response, Self::Error> {
		Box::pin(self.round_trip("transport_send", ctx, request))
	}
}
impl<T> Clone for RateLimitedTransport<T>
where
	T: ?Sized + Transport,
{
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
			gate: Arc::clone(&self.gate),
			hook: self.hook.clone(),
			metrics: Arc::clone(&self.metrics),
		}
	}
}
impl<T> Debug for RateLimitedTransport<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimitedTransport")
			.field("rate", &self.gate.rate())
			.field("burst", &self.gate.burst())
			.field("hook_set", &self.hook.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		adapt::{HeaderAdaptation, REMAINING_HEADER, RESET_HEADER},
		error::CancelError,
	};

	#[tokio::test]
	async fn passes_results_through_without_hook() {
		let inner = Arc::new(StubTransport::ok().with_header("x-request-id", "abc"));
		let transport = RateLimitedTransport::new(Arc::clone(&inner), shared_bucket(10., 1));
		let response = transport
			.send(&RequestContext::new(), stub_request("/items"))
			.await
			.expect("Unthrottled request should succeed.");

		assert!(!transport.has_hook());
		assert_eq!(response.body(), "/items");
		assert_eq!(response.headers()["x-request-id"], "abc");
		assert_eq!(inner.calls(), 1);
	}

	#[tokio::test]
	async fn canceled_context_never_reaches_inner_transport() {
		let inner = Arc::new(StubTransport::ok());
		let bucket = shared_bucket(10., 1);
		let transport = RateLimitedTransport::new(Arc::clone(&inner), bucket.clone());
		let ctx = RequestContext::new();

		ctx.cancel();

		let err = transport
			.send(&ctx, stub_request("/items"))
			.await
			.expect_err("Canceled request must fail.");

		assert!(matches!(err, Error::Canceled(CancelError::Canceled)));
		assert_eq!(inner.calls(), 0);
		assert_eq!(bucket.available(), 1);
		assert_eq!(transport.metrics().canceled(), 1);
		assert_eq!(transport.metrics().admitted(), 0);
	}

	#[tokio::test]
	async fn transport_errors_pass_through_unchanged() {
		let inner = Arc::new(StubTransport::failing("connection refused"));
		let transport = RateLimitedTransport::new(inner, shared_bucket(10., 1));
		let err = transport
			.send(&RequestContext::new(), stub_request("/items"))
			.await
			.expect_err("Failing transport must surface its error.");

		assert_eq!(err.into_transport(), Some(StubError("connection refused".into())));
	}

	#[tokio::test]
	async fn custom_hook_sees_and_rewrites_outcome() {
		let inner = Arc::new(StubTransport::ok());
		let transport = RateLimitedTransport::builder(inner, shared_bucket(10., 1))
			.response_hook(|outcome: Result<http::Response<String>, Error<StubError>>| {
				outcome.and_then(|response| {
					if response.body() == "/forbidden" {
						Err(Error::hook(StubError("blocked by hook".into())))
					} else {
						Ok(response)
					}
				})
			})
			.build();
		let ctx = RequestContext::new();

		assert!(transport.send(&ctx, stub_request("/allowed")).await.is_ok());

		let err = transport
			.send(&ctx, stub_request("/forbidden"))
			.await
			.expect_err("Hook should reject the forbidden path.");

		assert!(matches!(err, Error::Hook { .. }));
		assert_eq!(transport.metrics().completed(), 2);
	}

	#[tokio::test]
	async fn last_hook_option_wins() {
		let inner = Arc::new(StubTransport::ok().with_header(REMAINING_HEADER, "abc").with_header(
			RESET_HEADER,
			"10",
		));
		let passthrough = RateLimitedTransport::builder(Arc::clone(&inner), shared_bucket(10., 1))
			.header_adaptation()
			.response_hook(|outcome: Result<http::Response<String>, Error<StubError>>| outcome)
			.build();

		passthrough
			.send(&RequestContext::new(), stub_request("/items"))
			.await
			.expect("Custom hook applied last should ignore malformed headers.");

		let adapting = RateLimitedTransport::builder(inner, shared_bucket(10., 1))
			.response_hook(|outcome: Result<http::Response<String>, Error<StubError>>| outcome)
			.header_adaptation()
			.build();
		let err = adapting
			.send(&RequestContext::new(), stub_request("/items"))
			.await
			.expect_err("Header adaptation applied last should reject malformed headers.");

		assert!(err.is_header_parse());
	}

	#[tokio::test]
	async fn standalone_header_adaptation_installs_as_custom_hook() {
		let inner = Arc::new(
			StubTransport::ok().with_header(REMAINING_HEADER, "30").with_header(RESET_HEADER, "10"),
		);
		let gate = shared_bucket(50., 1);
		let transport = RateLimitedTransport::builder(inner, gate.clone())
			.response_hook(HeaderAdaptation::new(&gate))
			.build();

		transport
			.send(&RequestContext::new(), stub_request("/items"))
			.await
			.expect("Valid rate-limit headers should not fail the request.");

		assert!(transport.has_hook());
		assert_eq!(gate.rate().as_f64(), 3.);
		// Only builder-installed adaptation reports into the transport counters.
		assert_eq!(transport.metrics().adapted(), 0);
	}

	#[tokio::test]
	async fn decorator_composes_as_a_transport() {
		let inner = Arc::new(StubTransport::ok());
		let outer_bucket = shared_bucket(10., 2);
		let inner_layer = RateLimitedTransport::new(Arc::clone(&inner), shared_bucket(10., 2));
		let stacked = RateLimitedTransport::new(Arc::new(inner_layer), outer_bucket.clone());

		<RateLimitedTransport<_> as Transport>::send(
			&stacked,
			&RequestContext::new(),
			stub_request("/nested"),
		)
		.await
		.expect("Stacked layers should admit the request.");

		assert_eq!(inner.calls(), 1);
		assert_eq!(outer_bucket.available(), 1);
	}
}
