// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Instant;

/// Maximal number of tokens a bucket can hold
const CAPACITY: f64 = 1.0;

/// Idle time in seconds after which a client is forgotten
pub(crate) const IDLE_SECONDS: f64 = 60.0;

/// Token bucket of a single client
#[derive(Debug, Clone)]
pub(crate) struct ClientBucket {
    tokens: f64,
    last_refill: Instant,
}

impl ClientBucket {
    /// Creates a full bucket.
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            tokens: CAPACITY,
            last_refill: now,
        }
    }

    /// Tokens the bucket would hold at `now` without the capacity limit.
    fn accumulated(&self, now: Instant, rate: f64) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens + elapsed * rate
    }

    /// Refills the bucket and consumes a token if a full one is available.
    pub(crate) fn try_consume(&mut self, now: Instant, rate: f64) -> bool {
        self.tokens = self.accumulated(now, rate).min(CAPACITY);
        if now > self.last_refill {
            self.last_refill = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Checks whether the client has been idle long enough to be forgotten.
    pub(crate) fn is_expired(&self, now: Instant, rate: f64) -> bool {
        self.accumulated(now, rate) >= IDLE_SECONDS * rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;
    use test_log::test;

    #[test]
    fn refill() {
        let start = Instant::now();
        let mut bucket = ClientBucket::new(start);
        assert!(bucket.try_consume(start, 1.0));
        assert!(!bucket.try_consume(start, 1.0));
        assert!(!bucket.try_consume(start + Duration::from_millis(500), 1.0));
        assert!(bucket.try_consume(start + Duration::from_millis(1000), 1.0));

        // Capacity is one token, waiting longer doesn't allow bursts
        assert!(bucket.try_consume(start + Duration::from_secs(10), 1.0));
        assert!(!bucket.try_consume(start + Duration::from_secs(10), 1.0));
    }

    #[test]
    fn expiry() {
        let start = Instant::now();
        let mut bucket = ClientBucket::new(start);
        assert!(bucket.try_consume(start, 1.0));
        assert!(!bucket.is_expired(start + Duration::from_secs(59), 1.0));
        assert!(bucket.is_expired(start + Duration::from_secs(60), 1.0));

        // Half a token per second: 30 tokens after a minute
        let mut bucket = ClientBucket::new(start);
        assert!(bucket.try_consume(start, 0.5));
        assert!(!bucket.is_expired(start + Duration::from_secs(59), 0.5));
        assert!(bucket.is_expired(start + Duration::from_secs(60), 0.5));
    }
}
