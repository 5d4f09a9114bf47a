//! Token-bucket throttling for outbound HTTP transports. Every request passes a fair admission
//! queue, and `RateLimit-*` response headers can retune the refill rate on the fly.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod adapt;
pub mod client;
pub mod context;
pub mod error;
pub mod limiter;
pub mod obs;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		limiter::{Rate, TokenBucket},
		transport::{Transport, TransportFuture},
	};

	/// Error returned by [`StubTransport`] when it is configured to fail.
	#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
	#[error("Stub transport failed: {0}.")]
	pub struct StubError(pub String);

	/// In-process [`Transport`] that answers every request with a canned response or error
	/// while counting how many requests actually reached it.
	#[derive(Debug, Default)]
	pub struct StubTransport {
		headers: Vec<(&'static str, String)>,
		failure: Option<StubError>,
		calls: AtomicUsize,
	}
	impl StubTransport {
		/// Answers with an empty `200 OK`.
		pub fn ok() -> Self {
			Self::default()
		}

		/// Fails every round trip with `message`.
		pub fn failing(message: impl Into<String>) -> Self {
			Self { failure: Some(StubError(message.into())), ..Self::default() }
		}

		/// Adds a header to every canned response.
		pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
			self.headers.push((name, value.into()));

			self
		}

		/// Returns how many requests reached the stub.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl Transport for StubTransport {
		type Error = StubError;
		type Request = http::Request<String>;
		type Response = http::Response<String>;

		fn send<'a>(
			&'a self,
			_ctx: &'a RequestContext,
			request: Self::Request,
		) -> TransportFuture<'a, Self::Response, Self::Error> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);

				if let Some(failure) = &self.failure {
					return Err(failure.clone());
				}

				let mut builder = http::Response::builder().status(200);

				for (name, value) in &self.headers {
					builder = builder.header(*name, value.as_str());
				}

				Ok(builder
					.body(request.uri().to_string())
					.expect("Stub response fixture should always build."))
			})
		}
	}

	/// Builds a `GET` request fixture for `path`.
	pub fn stub_request(path: &str) -> http::Request<String> {
		http::Request::get(path).body(String::new()).expect("Stub request fixture should build.")
	}

	/// Builds a shared [`TokenBucket`] with the given rate and burst.
	pub fn shared_bucket(rate: f64, burst: u32) -> Arc<TokenBucket> {
		let rate = Rate::per_second(rate).expect("Rate fixture should be valid.");

		Arc::new(TokenBucket::new(rate, burst).expect("Bucket fixture should be valid."))
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::{Arc, Weak},
		time::Duration,
	};

	pub use http::HeaderMap;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;

	pub use crate::{
		context::RequestContext,
		error::Error,
	};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
#[cfg(test)] use {httpmock as _, serde_json as _};
