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

//! # Rotating Log Module for miniws
//!
//! This crate writes the access and error logs of the web server. Both are plain files in the log
//! directory, `logs` by default:
//!
//! * `access.log` receives one line per request in the Combined Log Format:
//!
//!   ```text
//!   192.0.2.1 - - [29/May/2024:10:53:19 +0000] "GET /index.html HTTP/1.1" 200 876 "-" "curl/8.5.0"
//!   ```
//! * `error.log` receives free-text messages, one per line.
//!
//! The directory is only created once something is written, so that an unwritable log location
//! doesn't prevent the server from starting.
//!
//! ## Rotation
//!
//! After each write the log file size is checked. Once it exceeds `max_log_bytes` (10 MiB by
//! default) the file is renamed to `<name>.<uuid>` and an empty file takes its place. The renamed
//! file is then packed into `<name>.<uuid>.tar.gz` and removed. Should packing fail, the renamed
//! file stays in place and the failure is recorded in the error log.
//!
//! Separate thresholds can be configured for the two logs via `max_access_log_bytes` and
//! `max_error_log_bytes`.
//!
//! ## Writer thread
//!
//! [`LogWriter`] hands all messages to a dedicated thread, so that file operations never block
//! request processing and the write, size check and rotation of a file never interleave. Writing
//! failures are reported via the `log` crate only.
//!
//! Sending `SIGHUP` or `SIGUSR1` to the process makes the writer reopen its log files, see
//! [`LogWriter::reopen_on_signals`].

pub mod configuration;
mod record;
mod rotation;
mod writer;

pub use configuration::{LogConf, LogOpt};
pub use record::LogRecord;
pub use rotation::{compress, rotate_if_needed};
pub use writer::LogWriter;

/// File name of the access log within the log directory
pub const ACCESS_LOG: &str = "access.log";

/// File name of the error log within the log directory
pub const ERROR_LOG: &str = "error.log";
