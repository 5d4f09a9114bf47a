//! Built-in transports.
//!
//! With the `reqwest` feature (on by default) the crate ships [`ReqwestTransport`], a thin
//! [`Transport`] over [`ReqwestClient`], and [`ReqwestRateLimited`] for the common
//! "throttle a reqwest client" setup.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// self
#[cfg(feature = "reqwest")]
use crate::{
	_prelude::*,
	limiter::AdmissionGate,
	transport::{RateLimitedTransport, ResponseHeaders, Transport, TransportFuture},
};

/// Rate-limited transport specialized for the crate's default reqwest stack.
#[cfg(feature = "reqwest")]
pub type ReqwestRateLimited = RateLimitedTransport<ReqwestTransport>;

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The context is not used to abort requests once they are on the wire; configure
/// [`reqwest::ClientBuilder::timeout`] on the wrapped client to bound in-flight calls.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	type Error = ReqwestError;
	type Request = reqwest::Request;
	type Response = reqwest::Response;

	fn send<'a>(
		&'a self,
		_ctx: &'a RequestContext,
		request: Self::Request,
	) -> TransportFuture<'a, Self::Response, Self::Error> {
		Box::pin(self.0.execute(request))
	}
}

#[cfg(feature = "reqwest")]
impl ResponseHeaders for reqwest::Response {
	fn headers(&self) -> &HeaderMap {
		reqwest::Response::headers(self)
	}
}

#[cfg(feature = "reqwest")]
impl RateLimitedTransport<ReqwestTransport> {
	/// Throttles a default reqwest client through `gate`, adapting the rate from response
	/// headers.
	pub fn reqwest(gate: Arc<dyn AdmissionGate>) -> Self {
		Self::reqwest_with_client(ReqwestClient::default(), gate)
	}

	/// Same as [`RateLimitedTransport::reqwest`] with a caller-provided client.
	pub fn reqwest_with_client(client: ReqwestClient, gate: Arc<dyn AdmissionGate>) -> Self {
		Self::builder(Arc::new(ReqwestTransport::with_client(client)), gate)
			.header_adaptation()
			.build()
	}
}
