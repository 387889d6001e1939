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

//! # Control Channel Module for miniws
//!
//! This crate allows controlling a running server through a Unix socket, by default
//! `/tmp/miniws_commands_server`. A client connects and sends commands as plain text frames:
//!
//! ```text
//! <command>[ <argument> <argument> ...]
//! ```
//!
//! Each frame is answered with a single byte: `1` if a handler for the command exists and applied
//! it, `0` otherwise. A connection can carry any number of commands, frames are limited to
//! 4096 bytes.
//!
//! Handlers are registered in a [`CommandTable`]:
//!
//! ```rust
//! use control_channel_module::{Command, CommandTable};
//!
//! let mut table = CommandTable::new();
//! table.register("reload", |_args| true);
//!
//! assert!(table.dispatch(&Command::parse(b"reload").unwrap()));
//! assert!(!table.dispatch(&Command::parse(b"frobnicate now").unwrap()));
//! ```
//!
//! Only one server can use a given socket path. [`ControlServer::bind`] refuses to start if
//! another server answers on the path but removes a stale socket left behind by a crashed server.
//! Files at the path that aren't sockets are never removed, binding fails instead.
//! The socket is removed again when the server shuts down or the process receives `SIGINT` or
//! `SIGTERM`.
//!
//! The [`client`] functions implement the other side of the connection, the `miniws` binary uses
//! them for its `--signal` and `--control-shell` options.

pub mod client;
mod commands;
pub mod configuration;
mod server;

pub use commands::{Command, CommandTable, MAX_FRAME_SIZE};
pub use configuration::{ControlConf, ControlOpt};
pub use server::{prepare_endpoint, remove_on_termination, ControlServer, ControlService};
