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

//! # Static Files Module for miniws
//!
//! This crate answers `GET` and `HEAD` requests with files from a root directory. A request for
//! a directory is answered with the directory's index file, `index.html` by default. The content
//! type is derived from the file extension.
//!
//! The root directory is set via `root` in the configuration file or `--root` on the command
//! line. It defaults to the current directory and has to exist when the server starts:
//!
//! ```rust
//! use static_files_module::{Lookup, StaticFilesConf, StaticFilesHandler};
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(dir.path().join("index.html"), "<h1>Hi!</h1>").unwrap();
//!
//! let handler = StaticFilesHandler::new(StaticFilesConf {
//!     root: dir.path().to_owned(),
//!     ..Default::default()
//! })
//! .unwrap();
//! assert!(matches!(handler.lookup("/"), Lookup::Found(_)));
//! assert!(matches!(handler.lookup("/missing.html"), Lookup::Failed { .. }));
//! ```
//!
//! Requests resolving to a location outside the root directory are rejected, as are requests
//! with methods other than `GET` and `HEAD`.

pub mod configuration;
mod file_writer;
mod handler;
mod path;

pub use configuration::{StaticFilesConf, StaticFilesOpt};
pub use handler::{Lookup, StaticFilesHandler};
pub use path::resolve_uri;
