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

//! Structures handling command line options and YAML deserialization for the Rate Limit Module

use clap::Args;
use serde::Deserialize;

/// Command line options of the rate limit module
#[derive(Debug, Default, Args)]
pub struct RateLimitOpt {
    /// Maximal number of requests a client may make per minute, 0 to disable rate limiting
    #[arg(long)]
    pub max_connections_per_minute: Option<u32>,
}

/// Configuration settings of the rate limit module
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitConf {
    /// Maximal number of requests a client may make per minute, 0 to disable rate limiting
    pub max_connections_per_minute: u32,
}

impl Default for RateLimitConf {
    fn default() -> Self {
        Self {
            max_connections_per_minute: 60,
        }
    }
}

impl RateLimitConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: RateLimitOpt) {
        if let Some(max) = opt.max_connections_per_minute {
            self.max_connections_per_minute = max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use module_utils::FromYaml;
    use test_log::test;

    #[test]
    fn configuration() {
        assert_eq!(
            RateLimitConf::from_yaml("{}").unwrap().max_connections_per_minute,
            60
        );

        let mut conf = RateLimitConf::from_yaml("max_connections_per_minute: 120").unwrap();
        assert_eq!(conf.max_connections_per_minute, 120);

        conf.merge_with_opt(RateLimitOpt {
            max_connections_per_minute: Some(0),
        });
        assert_eq!(conf.max_connections_per_minute, 0);
    }
}
