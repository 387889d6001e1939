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

use log::{debug, trace};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::bucket::ClientBucket;

/// Tracks a token bucket per client and decides whether a request is admitted
#[derive(Debug)]
pub struct ClientRateLimiter {
    /// Tokens per second, zero if rate limiting is disabled
    rate: f64,
    buckets: Mutex<HashMap<String, ClientBucket>>,
}

impl ClientRateLimiter {
    /// Creates a rate limiter admitting `max_connections_per_minute` requests per client and
    /// minute. A value of 0 disables rate limiting.
    pub fn new(max_connections_per_minute: u32) -> Self {
        Self {
            rate: f64::from(max_connections_per_minute) / 60.0,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether rate limiting is active
    pub fn is_enabled(&self) -> bool {
        self.rate > 0.0
    }

    /// Decides whether a request from the client is admitted now.
    pub fn admit(&self, client_id: &str) -> bool {
        self.admit_at(client_id, Instant::now())
    }

    /// Decides whether a request from the client is admitted at the given point in time.
    ///
    /// Expired buckets of all clients are removed afterwards, under the same lock.
    pub fn admit_at(&self, client_id: &str, now: Instant) -> bool {
        if !self.is_enabled() {
            return true;
        }

        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

        let admitted = buckets
            .entry(client_id.to_owned())
            .or_insert_with(|| ClientBucket::new(now))
            .try_consume(now, self.rate);
        if !admitted {
            debug!("rate limit exceeded for client {client_id}");
        }

        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_expired(now, self.rate));
        if buckets.len() < before {
            trace!("forgot {} idle clients", before - buckets.len());
        }

        admitted
    }

    /// Number of clients currently remembered
    pub fn tracked_clients(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
