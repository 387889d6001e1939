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

//! Structures handling command line options and YAML deserialization for the Rotating Log Module

use clap::Args;
use serde::Deserialize;
use std::path::PathBuf;

/// Command line options of the rotating log module
#[derive(Debug, Default, Args)]
pub struct LogOpt {
    /// Directory to write access.log and error.log to
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Size in bytes after which log files are rotated
    #[arg(long)]
    pub max_log_bytes: Option<u64>,
}

/// Configuration settings of the rotating log module
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConf {
    /// Directory to write the log files to, created on first write
    pub log_dir: PathBuf,
    /// Size in bytes after which a log file is rotated
    pub max_log_bytes: u64,
    /// Rotation threshold for the access log if different from `max_log_bytes`
    pub max_access_log_bytes: Option<u64>,
    /// Rotation threshold for the error log if different from `max_log_bytes`
    pub max_error_log_bytes: Option<u64>,
}

impl Default for LogConf {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            max_log_bytes: 10 * 1024 * 1024,
            max_access_log_bytes: None,
            max_error_log_bytes: None,
        }
    }
}

impl LogConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: LogOpt) {
        if let Some(log_dir) = opt.log_dir {
            self.log_dir = log_dir;
        }

        if let Some(max_log_bytes) = opt.max_log_bytes {
            self.max_log_bytes = max_log_bytes;
        }
    }

    /// Rotation threshold of the access log
    pub fn access_log_threshold(&self) -> u64 {
        self.max_access_log_bytes.unwrap_or(self.max_log_bytes)
    }

    /// Rotation threshold of the error log
    pub fn error_log_threshold(&self) -> u64 {
        self.max_error_log_bytes.unwrap_or(self.max_log_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use module_utils::FromYaml;
    use test_log::test;

    #[test]
    fn thresholds() {
        let conf = LogConf::from_yaml("{}").unwrap();
        assert_eq!(conf, LogConf::default());
        assert_eq!(conf.access_log_threshold(), 10485760);
        assert_eq!(conf.error_log_threshold(), 10485760);

        let mut conf =
            LogConf::from_yaml("max_log_bytes: 1000\nmax_error_log_bytes: 200").unwrap();
        assert_eq!(conf.access_log_threshold(), 1000);
        assert_eq!(conf.error_log_threshold(), 200);

        conf.merge_with_opt(LogOpt {
            log_dir: Some("/var/log/miniws".into()),
            max_log_bytes: Some(5000),
        });
        assert_eq!(conf.log_dir, PathBuf::from("/var/log/miniws"));
        assert_eq!(conf.access_log_threshold(), 5000);
        assert_eq!(conf.error_log_threshold(), 200);
    }
}
