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

//! # Rate Limit Module for miniws
//!
//! This crate limits how many requests a single client may make per minute. Each client gets a
//! token bucket holding at most one token, refilled at `max_connections_per_minute / 60` tokens
//! per second. A request consumes one token, a request finding less than a full token is
//! rejected. With the default of 60 this means one request per second and client.
//!
//! Clients are only remembered while they are active. Once a client's bucket would have
//! accumulated a full minute worth of tokens it is forgotten, its next request is treated like
//! a new client's first one.
//!
//! Setting `max_connections_per_minute` to 0 disables rate limiting.
//!
//! ```rust
//! use rate_limit_module::ClientRateLimiter;
//!
//! let limiter = ClientRateLimiter::new(60);
//! assert!(limiter.admit("192.0.2.1"));
//! assert!(!limiter.admit("192.0.2.1"));
//! assert!(limiter.admit("192.0.2.2"));
//! ```

mod bucket;
pub mod configuration;
mod limiter;

pub use configuration::{RateLimitConf, RateLimitOpt};
pub use limiter::ClientRateLimiter;
