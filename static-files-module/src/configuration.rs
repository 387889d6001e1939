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

//! Data structures required for `StaticFilesHandler` configuration

use clap::Args;
use serde::Deserialize;
use std::path::PathBuf;

/// Command line options of the static files module
#[derive(Debug, Default, Args)]
pub struct StaticFilesOpt {
    /// The root directory.
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Index file to look for when displaying a directory. This command line flag can be specified
    /// multiple times.
    #[arg(long)]
    pub index_file: Option<Vec<String>>,
}

/// Configuration file settings of the static files module
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StaticFilesConf {
    /// The root directory.
    pub root: PathBuf,

    /// List of index files to look for in a directory.
    pub index_file: Vec<String>,
}

impl StaticFilesConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: StaticFilesOpt) {
        if let Some(root) = opt.root {
            self.root = root;
        }

        if let Some(index_file) = opt.index_file {
            self.index_file = index_file;
        }
    }
}

impl Default for StaticFilesConf {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index_file: vec!["index.html".to_owned()],
        }
    }
}
