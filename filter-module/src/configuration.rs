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

//! Structures handling command line options and YAML deserialization for the Filter Module

use clap::Args;
use serde::Deserialize;
use std::path::PathBuf;

/// Command line options of the filter module
#[derive(Debug, Default, Args)]
pub struct FilterOpt {
    /// Directory containing the IP and User-Agent filter files
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
}

/// Configuration settings of the filter module
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterConf {
    /// Directory containing the filter files, created if missing
    pub config_dir: PathBuf,
    /// File name of the IP address filter within `config_dir`
    pub ip_filter_file: String,
    /// File name of the User-Agent filter within `config_dir`
    pub user_agent_filter_file: String,
}

impl Default for FilterConf {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            ip_filter_file: "ipfilter.conf".to_owned(),
            user_agent_filter_file: "useragentfilter.conf".to_owned(),
        }
    }
}

impl FilterConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: FilterOpt) {
        if let Some(config_dir) = opt.config_dir {
            self.config_dir = config_dir;
        }
    }

    /// Full path of the IP address filter file
    pub fn ip_filter_path(&self) -> PathBuf {
        self.config_dir.join(&self.ip_filter_file)
    }

    /// Full path of the User-Agent filter file
    pub fn user_agent_filter_path(&self) -> PathBuf {
        self.config_dir.join(&self.user_agent_filter_file)
    }
}
