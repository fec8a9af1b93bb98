use std::time::{Duration, Instant};

/// Token bucket over inbound messages, one per connection. The bucket
/// holds 30 tokens and refills one every two seconds.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tokens: u32,
    max_tokens: u32,
    refill_interval: Duration,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::new_with_limits(30, Duration::from_secs(2))
    }

    pub fn new_with_limits(max_tokens: u32, refill_interval: Duration) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_interval,
            last_refill: Instant::now(),
        }
    }

    /// Take one token if available.
    pub fn allow(&mut self) -> bool {
        self.refill();

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed();
        if elapsed < self.refill_interval {
            return;
        }

        let earned = (elapsed.as_millis() / self.refill_interval.as_millis()) as u32;
        self.tokens = (self.tokens + earned).min(self.max_tokens);
        self.last_refill = Instant::now();
    }

    pub fn remaining(&mut self) -> u32 {
        self.refill();
        self.tokens
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
