//! Process-wide outbound rate gate
//!
//! One shared "time of last call" for every key and every logical request.
//! The lock is held across the wait, so concurrent callers are admitted one
//! at a time, each at least `min_spacing` after the previous.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub struct RateLimiter {
    min_spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Wait until the gate opens, then record the call start.
    /// Returns the admitted start instant.
    pub async fn acquire(&self) -> Instant {
        let mut last_call = self.last_call.lock().await;

        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_spacing {
                let wait = self.min_spacing - elapsed;
                debug!("⏳ Rate limiting: waiting {}ms before next API call", wait.as_millis());
                tokio::time::sleep(wait).await;
            }
        }

        let now = Instant::now();
        *last_call = Some(now);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_calls_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(250));
        let first = limiter.acquire().await;
        let second = limiter.acquire().await;
        assert!(second.duration_since(first) >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let before = Instant::now();
        let admitted = limiter.acquire().await;
        assert_eq!(admitted.duration_since(before), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_spacing_elapsed() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        let before = Instant::now();
        let admitted = limiter.acquire().await;
        assert_eq!(admitted.duration_since(before), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_serialized() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(250)));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();

        let mut starts = Vec::new();
        for handle in handles {
            starts.push(handle.await.unwrap());
        }
        starts.sort();
        for pair in starts.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(250));
        }
    }
}
