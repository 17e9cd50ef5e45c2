/// Decides how long to wait before retrying the current provider. A negative
/// return means "stop retrying this provider" and advances the rotation.
pub trait RetryStrategy
where
	Self: Send + Sync,
{
	fn next_backoff_ms(&self, attempt: u32) -> i64;
}

/// Capped exponential backoff: `base * 2^attempt`, hard-capped at 30 seconds,
/// with a bounded attempt count.
#[derive(Clone, Copy, Debug)]
pub struct SimpleRetryStrategy {
	pub max_attempts: u32,
	pub base_delay_ms: i64,
}
impl Default for SimpleRetryStrategy {
	fn default() -> Self {
		Self { max_attempts: 3, base_delay_ms: 100 }
	}
}
impl RetryStrategy for SimpleRetryStrategy {
	fn next_backoff_ms(&self, attempt: u32) -> i64 {
		const MAX_DELAY_MS: i64 = 30_000;

		if self.max_attempts == 0 || attempt >= self.max_attempts {
			return -1;
		}

		let backoff = self.base_delay_ms.saturating_mul(1_i64 << attempt.min(20));

		backoff.min(MAX_DELAY_MS)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_doubles_then_stops() {
		let strategy = SimpleRetryStrategy { max_attempts: 3, base_delay_ms: 100 };

		assert_eq!(strategy.next_backoff_ms(0), 100);
		assert_eq!(strategy.next_backoff_ms(1), 200);
		assert_eq!(strategy.next_backoff_ms(2), 400);
		assert_eq!(strategy.next_backoff_ms(3), -1);
	}

	#[test]
	fn backoff_is_capped_at_thirty_seconds() {
		let strategy = SimpleRetryStrategy { max_attempts: 32, base_delay_ms: 1_000 };

		assert_eq!(strategy.next_backoff_ms(10), 30_000);
		assert_eq!(strategy.next_backoff_ms(31), 30_000);
	}

	#[test]
	fn zero_attempts_never_retries() {
		let strategy = SimpleRetryStrategy { max_attempts: 0, base_delay_ms: 100 };

		assert_eq!(strategy.next_backoff_ms(0), -1);
	}
}
