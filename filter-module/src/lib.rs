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

//! # Filter Module for miniws
//!
//! This crate decides whether a request may be served based on the client's IP address and the
//! `User-Agent` request header. Both lists are read from plain text files in the configuration
//! directory, `ipfilter.conf` and `useragentfilter.conf` by default:
//!
//! ```text
//! deny
//! 192.0.2.7       # inline comments are ignored
//! # as are comment lines
//! 198.51.100.12
//! ```
//!
//! The first line that isn't empty after removing comments selects the mode, `allow` or `deny`.
//! All subsequent lines are patterns. IP addresses are compared exactly against the client
//! address (without the port), User-Agent patterns match anywhere within the header value.
//!
//! | Mode    | IP list                        | User-Agent list                      |
//! |---------|--------------------------------|--------------------------------------|
//! | `allow` | allowed if the address listed  | allowed if any pattern is contained  |
//! | `deny`  | allowed unless address listed  | allowed unless any pattern contained |
//!
//! A missing filter file is created empty. An empty file means `deny` without any patterns, so
//! that a server without filter configuration serves everyone.
//!
//! The configuration directory can be set with `config_dir` in the configuration file or the
//! `--config-dir` command line option. File names are configurable via `ip_filter_file` and
//! `user_agent_filter_file` settings.
//!
//! ## Reloading
//!
//! [`FilterStore`] keeps the active lists as an immutable [`Filters`] snapshot. A reload reads
//! both files again and replaces the snapshot only if both could be loaded, requests in flight
//! keep using the snapshot they started with.
//!
//! ```rust
//! use filter_module::{FilterConf, FilterStore};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let conf = FilterConf {
//!     config_dir: dir.path().to_owned(),
//!     ..Default::default()
//! };
//!
//! // Files are created empty: everyone is allowed.
//! let store = FilterStore::load(conf).unwrap();
//! assert!(store.is_allowed("192.0.2.1", "curl/8.0"));
//!
//! std::fs::write(dir.path().join("ipfilter.conf"), "deny\n192.0.2.1\n").unwrap();
//! store.reload().unwrap();
//! assert!(!store.is_allowed("192.0.2.1", "curl/8.0"));
//! assert!(store.is_allowed("192.0.2.2", "curl/8.0"));
//! ```

pub mod configuration;
mod list;
mod store;

pub use configuration::{FilterConf, FilterOpt};
pub use list::{FilterList, FilterMode, MatchKind};
pub use store::{FilterStore, Filters};
