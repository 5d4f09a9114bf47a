//! Per-request cancellation context.
//!
//! A [`RequestContext`] pairs an explicit [`CancellationToken`] with an optional deadline and is
//! threaded by reference through every admission wait and round trip. Cloning a context shares
//! the same token, so canceling any clone cancels them all; [`RequestContext::child`] derives a
//! context that is canceled with its parent but can also be canceled on its own.

// crates.io
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, error::CancelError};

/// Cancellation signal plus optional deadline attached to one request.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
	token: CancellationToken,
	deadline: Option<Instant>,
}
impl RequestContext {
	/// Creates a context with no deadline and a fresh cancellation token.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a context driven by an existing cancellation token.
	pub fn with_cancellation(token: CancellationToken) -> Self {
		Self { token, deadline: None }
	}

	/// Sets the deadline, keeping the earlier one if a deadline is already present.
	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(match self.deadline {
			Some(current) => current.min(deadline),
			None => deadline,
		});

		self
	}

	/// Sets the deadline relative to now.
	pub fn with_timeout(self, timeout: Duration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	/// Derives a context that ends when either it or its parent is canceled.
	pub fn child(&self) -> Self {
		Self { token: self.token.child_token(), deadline: self.deadline }
	}

	/// Fires the cancellation signal.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Underlying cancellation token.
	pub fn cancellation_token(&self) -> &CancellationToken {
		&self.token
	}

	/// Deadline, if any.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Returns the reason the context has ended, or `Ok(())` while it is still live.
	pub fn check(&self) -> Result<(), CancelError> {
		if self.token.is_cancelled() {
			return Err(CancelError::Canceled);
		}
		if let Some(deadline) = self.deadline
			&& Instant::now() >= deadline
		{
			return Err(CancelError::DeadlineExceeded);
		}

		Ok(())
	}

	/// Resolves once the context ends, yielding the reason.
	pub async fn done(&self) -> CancelError {
		match self.deadline {
			Some(deadline) => tokio::select! {
				biased;
				_ = self.token.cancelled() => CancelError::Canceled,
				_ = time::sleep_until(deadline) => CancelError::DeadlineExceeded,
			},
			None => {
				self.token.cancelled().await;

				CancelError::Canceled
			},
		}
	}
}
