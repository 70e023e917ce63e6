//! Pauses between units of work.
//!
//! The pipeline waits between products and between keywords so the
//! scraping proxy and the CMS are not hit in tight bursts. A wait can be
//! interrupted by cancellation.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// A fixed delay plus optional random jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Politeness {
    pub delay: Duration,
    /// Uniform `[0, jitter)` added on top of `delay`. Zero disables it.
    pub jitter: Duration,
}

impl Politeness {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// No waiting at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn effective_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.delay;
        }
        self.delay + Duration::from_millis(rand_jitter_ms(self.jitter.as_millis() as u64))
    }

    /// Sleep for the effective delay. Returns `false` if cancelled first.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let delay = self.effective_delay();
        if delay.is_zero() {
            return !cancel.is_cancelled();
        }
        tracing::debug!(sleep_ms = %delay.as_millis(), "Waiting before next item");
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

impl Default for Politeness {
    /// 5 seconds between products.
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

// xorshift seeded from the clock; only used for jitter.
fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
