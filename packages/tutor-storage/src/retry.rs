//! Bounded retry with exponential backoff around data-access calls.
//!
//! Only errors classified as transient are retried. A [`Cancellation`] aborts both an in-flight
//! attempt and any pending backoff sleep.

use std::{
	future::Future,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use tokio::sync::Notify;

use crate::{Error, Result};

const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_retries: u32,
	pub base_backoff: Duration,
	pub max_backoff: Duration,
}
impl RetryPolicy {
	pub fn from_config(cfg: &tutor_config::Retry) -> Self {
		Self {
			max_retries: cfg.max_retries,
			base_backoff: Duration::from_millis(cfg.base_backoff_ms),
			max_backoff: Duration::from_millis(cfg.max_backoff_ms),
		}
	}

	pub fn none() -> Self {
		Self { max_retries: 0, base_backoff: Duration::ZERO, max_backoff: Duration::ZERO }
	}

	/// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`, capped.
	pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
		let exp = attempt.max(1).saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
		let delay = self.base_backoff.saturating_mul(1_u32 << exp);

		delay.min(self.max_backoff)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::from_config(&tutor_config::Retry::default())
	}
}

#[derive(Debug, Default)]
struct CancellationInner {
	cancelled: AtomicBool,
	notify: Notify,
}

/// Shared cancellation flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
	inner: Arc<CancellationInner>,
}
impl Cancellation {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.inner.cancelled.store(true, Ordering::SeqCst);
		self.inner.notify.notify_waiters();
	}

	pub fn is_cancelled(&self) -> bool {
		self.inner.cancelled.load(Ordering::SeqCst)
	}

	/// Resolves once [`Cancellation::cancel`] has been called.
	pub async fn cancelled(&self) {
		loop {
			let notified = self.inner.notify.notified();

			if self.is_cancelled() {
				return;
			}

			notified.await;
		}
	}
}

pub async fn with_retry<T, F, Fut>(
	policy: &RetryPolicy,
	operation: &'static str,
	cancel: &Cancellation,
	mut call: F,
) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let mut attempt: u32 = 0;

	loop {
		if cancel.is_cancelled() {
			return Err(Error::Cancelled { operation });
		}

		attempt += 1;

		let outcome = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(Error::Cancelled { operation }),
			outcome = call() => outcome,
		};
		let err = match outcome {
			Ok(value) => {
				if attempt > 1 {
					tracing::info!(operation, attempt, "Data access recovered after retry.");
				}

				return Ok(value);
			},
			Err(err) => err,
		};

		if !err.is_transient() {
			return Err(err);
		}
		if attempt > policy.max_retries {
			tracing::error!(operation, attempts = attempt, error = %err, "Data access retries exhausted.");

			return Err(Error::Exhausted { operation, attempts: attempt, source: Box::new(err) });
		}

		let delay = policy.backoff_for_attempt(attempt);

		tracing::warn!(
			operation,
			attempt,
			delay_ms = delay.as_millis() as u64,
			error = %err,
			"Transient data access failure. Retrying."
		);

		tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(Error::Cancelled { operation }),
			_ = tokio::time::sleep(delay) => {},
		}
	}
}
