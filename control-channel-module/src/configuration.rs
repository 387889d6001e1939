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

//! Structures handling command line options and YAML deserialization for the Control Channel
//! Module

use clap::Args;
use serde::Deserialize;
use std::path::PathBuf;

/// Command line options of the control channel module
#[derive(Debug, Default, Args)]
pub struct ControlOpt {
    /// Path of the Unix socket accepting control commands
    #[arg(long)]
    pub control_socket: Option<PathBuf>,
}

/// Configuration settings of the control channel module
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ControlConf {
    /// Path of the Unix socket accepting control commands
    pub control_socket: PathBuf,
}

impl Default for ControlConf {
    fn default() -> Self {
        Self {
            control_socket: PathBuf::from("/tmp/miniws_commands_server"),
        }
    }
}

impl ControlConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: ControlOpt) {
        if let Some(control_socket) = opt.control_socket {
            self.control_socket = control_socket;
        }
    }
}
