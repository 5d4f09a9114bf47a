//! Fair, internally synchronized token bucket whose refill rate can change under load.

// std
use std::pin;
// crates.io
use tokio::{
	sync::{Mutex as QueueMutex, Notify},
	time::{self, Instant},
};
// self
use crate::{
	_prelude::*,
	error::{CancelError, ConfigError},
	limiter::{AdmissionGate, GateFuture, LimiterConfig, Rate},
	obs,
};

// Absorbs float drift so a token refilled "exactly on time" is not missed.
const TOKEN_EPSILON: f64 = 1e-9;
// Matches the timer resolution.
const MIN_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct BucketState {
	tokens: f64,
	rate: Rate,
	last_refill: Instant,
}
impl BucketState {
	fn refill(&mut self, now: Instant, burst: f64) {
		let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

		self.tokens = (self.tokens + elapsed * self.rate.as_f64()).min(burst);
		self.last_refill = now;
	}

	/// Takes one token, or reports how long until one is due (`None` when the rate is zero).
	fn try_take(&mut self, now: Instant, burst: f64) -> Result<(), Option<Duration>> {
		self.refill(now, burst);

		if self.tokens + TOKEN_EPSILON >= 1. {
			self.tokens = (self.tokens - 1.).max(0.);

			Ok(())
		} else {
			Err(self.rate.time_to_accumulate(1. - self.tokens).map(|delay| delay.max(MIN_SLEEP)))
		}
	}
}

/// Token bucket implementing [`AdmissionGate`].
///
/// The bucket starts full. Waiters line up on a FIFO async mutex and only the head of the line
/// touches the token count, so admission order matches arrival order. The head sleeps until its
/// token is due; [`set_rate`](AdmissionGate::set_rate) wakes it so the new rate applies to the
/// wait already in progress.
#[derive(Debug)]
pub struct TokenBucket {
	burst: u32,
	state: Mutex<BucketState>,
	queue: QueueMutex<()>,
	rate_changed: Notify,
}
impl TokenBucket {
	/// Creates a full bucket holding `burst` tokens and refilling at `rate`.
	pub fn new(rate: Rate, burst: u32) -> Result<Self, ConfigError> {
		if burst == 0 {
			return Err(ConfigError::ZeroBurst);
		}

		Ok(Self {
			burst,
			state: Mutex::new(BucketState {
				tokens: f64::from(burst),
				rate,
				last_refill: Instant::now(),
			}),
			queue: QueueMutex::new(()),
			rate_changed: Notify::new(),
		})
	}

	/// Shorthand for [`TokenBucket::new`] with an unvalidated rate.
	pub fn per_second(rate: f64, burst: u32) -> Result<Self, ConfigError> {
		Self::new(Rate::per_second(rate)?, burst)
	}

	/// Builds a bucket from serialized settings.
	pub fn from_config(config: &LimiterConfig) -> Result<Self, ConfigError> {
		Self::new(config.rate, config.burst)
	}

	/// Whole tokens available right now.
	pub fn available(&self) -> u32 {
		let mut state = self.state.lock();

		state.refill(Instant::now(), self.burst_f64());

		// Bounded by `burst`, so the cast cannot truncate.
		(state.tokens + TOKEN_EPSILON).floor() as u32
	}

	fn burst_f64(&self) -> f64 {
		f64::from(self.burst)
	}

	async fn acquire(&self, ctx: &RequestContext) -> Result<(), CancelError> {
		ctx.check()?;

		let _turn = tokio::select! {
			biased;
			reason = ctx.done() => return Err(reason),
			turn = self.queue.lock() => turn,
		};

		loop {
			// Registered before reading the rate so a concurrent `set_rate` cannot slip between.
			let rate_changed = pin::pin!(self.rate_changed.notified());
			let taken = self.state.lock().try_take(Instant::now(), self.burst_f64());
			let Err(due) = taken else {
				return Ok(());
			};

			match due {
				Some(delay) => tokio::select! {
					biased;
					reason = ctx.done() => return Err(reason),
					_ = rate_changed => {},
					_ = time::sleep(delay) => {},
				},
				None => tokio::select! {
					biased;
					reason = ctx.done() => return Err(reason),
					_ = rate_changed => {},
				},
			}
		}
	}
}
impl AdmissionGate for TokenBucket {
	fn wait<'a>(&'a self, ctx: &'a RequestContext) -> GateFuture<'a> {
		Box::pin(self.acquire(ctx))
	}

	fn set_rate(&self, rate: Rate) {
		let previous = {
			let mut state = self.state.lock();

			// Settle tokens earned under the old rate first.
			state.refill(Instant::now(), self.burst_f64());

			std::mem::replace(&mut state.rate, rate)
		};

		self.rate_changed.notify_waiters();

		obs::record_rate_change(previous, rate);
	}

	fn rate(&self) -> Rate {
		self.state.lock().rate
	}

	fn burst(&self) -> u32 {
		self.burst
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::shared_bucket;

	#[test]
	fn zero_burst_is_rejected() {
		assert_eq!(TokenBucket::per_second(1., 0).map(|_| ()), Err(ConfigError::ZeroBurst));
	}

	#[tokio::test(start_paused = true)]
	async fn burst_is_admitted_immediately_then_paced() {
		let bucket = shared_bucket(4., 3);
		let ctx = RequestContext::new();
		let started = Instant::now();

		for _ in 0..3 {
			bucket.wait(&ctx).await.expect("Burst tokens should be granted.");
		}

		assert_eq!(started.elapsed(), Duration::ZERO);
		assert_eq!(bucket.available(), 0);

		bucket.wait(&ctx).await.expect("Fourth token should be granted after refill.");

		let elapsed = started.elapsed();

		assert!(elapsed >= Duration::from_millis(250), "Waited only {elapsed:?}.");
		assert!(elapsed < Duration::from_millis(300), "Waited too long: {elapsed:?}.");
	}

	#[tokio::test(start_paused = true)]
	async fn tokens_never_exceed_burst() {
		let bucket = shared_bucket(100., 2);

		time::sleep(Duration::from_secs(10)).await;

		assert_eq!(bucket.available(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn canceled_context_fails_without_consuming() {
		let bucket = shared_bucket(1., 1);
		let ctx = RequestContext::new();

		ctx.cancel();

		assert_eq!(bucket.wait(&ctx).await, Err(CancelError::Canceled));
		assert_eq!(bucket.available(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn deadline_interrupts_a_parked_waiter() {
		let bucket = shared_bucket(0., 1);
		let ctx = RequestContext::new();

		bucket.wait(&ctx).await.expect("Initial burst token should be granted.");

		let bounded = RequestContext::new().with_timeout(Duration::from_secs(1));

		assert_eq!(bucket.wait(&bounded).await, Err(CancelError::DeadlineExceeded));
		assert_eq!(bucket.available(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn raising_the_rate_wakes_the_head_waiter() {
		let bucket = shared_bucket(0., 1);
		let ctx = RequestContext::new();

		bucket.wait(&ctx).await.expect("Initial burst token should be granted.");

		let waiter = {
			let bucket = Arc::clone(&bucket);

			tokio::spawn(async move {
				let started = Instant::now();

				bucket.wait(&RequestContext::new()).await.map(|()| started.elapsed())
			})
		};

		time::sleep(Duration::from_secs(30)).await;

		assert!(!waiter.is_finished(), "Zero rate must park the waiter.");

		bucket.set_rate(Rate::per_second(10.).expect("Rate fixture should be valid."));

		let waited = waiter
			.await
			.expect("Waiter task should not panic.")
			.expect("Waiter should be admitted after the rate change.");

		assert!(waited >= Duration::from_secs(30));
		assert!(waited < Duration::from_secs(31));
		assert_eq!(bucket.rate().as_f64(), 10.);
	}

	#[tokio::test(start_paused = true)]
	async fn waiters_are_admitted_in_arrival_order() {
		let bucket = shared_bucket(1., 1);
		let admitted = Arc::new(Mutex::new(Vec::new()));
		let mut handles = Vec::new();

		bucket.wait(&RequestContext::new()).await.expect("Initial burst token should be granted.");

		for id in 0..4 {
			let bucket = Arc::clone(&bucket);
			let admitted = Arc::clone(&admitted);

			handles.push(tokio::spawn(async move {
				bucket.wait(&RequestContext::new()).await.expect("Waiter should be admitted.");
				admitted.lock().push(id);
			}));

			// Let the task reach the queue before spawning the next one.
			for _ in 0..3 {
				tokio::task::yield_now().await;
			}
		}
		for handle in handles {
			handle.await.expect("Waiter task should not panic.");
		}

		assert_eq!(*admitted.lock(), vec![0, 1, 2, 3]);
	}
}
