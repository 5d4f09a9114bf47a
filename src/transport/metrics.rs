// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for throttled requests.
#[derive(Debug, Default)]
pub struct TransportMetrics {
	admitted: AtomicU64,
	canceled: AtomicU64,
	completed: AtomicU64,
	adapted: AtomicU64,
	adaptation_failures: AtomicU64,
}
impl TransportMetrics {
	/// Returns the number of requests the gate admitted.
	pub fn admitted(&self) -> u64 {
		self.admitted.load(Ordering::Relaxed)
	}

	/// Returns the number of requests whose context ended before admission.
	pub fn canceled(&self) -> u64 {
		self.canceled.load(Ordering::Relaxed)
	}

	/// Returns the number of round trips the inner transport finished, including failures.
	pub fn completed(&self) -> u64 {
		self.completed.load(Ordering::Relaxed)
	}

	/// Returns the number of responses that retuned the refill rate.
	pub fn adapted(&self) -> u64 {
		self.adapted.load(Ordering::Relaxed)
	}

	/// Returns the number of responses rejected for malformed rate-limit headers.
	pub fn adaptation_failures(&self) -> u64 {
		self.adaptation_failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_admitted(&self) {
		self.admitted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_canceled(&self) {
		self.canceled.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_completed(&self) {
		self.completed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_adapted(&self) {
		self.adapted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_adaptation_failure(&self) {
		self.adaptation_failures.fetch_add(1, Ordering::Relaxed);
	}
}
