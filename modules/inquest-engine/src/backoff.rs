use std::time::Duration;

use rand::Rng;

/// Max attempts for retryable (rate-limited / transient) external calls.
pub const MAX_ATTEMPTS: u32 = 3;

const BASE_DELAY: Duration = Duration::from_millis(500);

/// Exponential backoff with jitter: base * 2^attempt plus 0-250ms.
pub fn delay_for_attempt(attempt: u32) -> Duration {
    let backoff = BASE_DELAY * 2u32.pow(attempt.min(4));
    let jitter = Duration::from_millis(rand::rng().random_range(0..250));
    backoff + jitter
}

pub async fn sleep_before_retry(attempt: u32) {
    tokio::time::sleep(delay_for_attempt(attempt)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_attempts() {
        let first = delay_for_attempt(0);
        let third = delay_for_attempt(2);
        assert!(first >= BASE_DELAY);
        assert!(third >= BASE_DELAY * 4);
        // Jitter is bounded
        assert!(first < BASE_DELAY + Duration::from_millis(250));
    }
}
