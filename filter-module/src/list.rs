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

//! Parsing and matching of a single filter list

use log::debug;
use module_utils::pingora::{Error, ErrorType};
use module_utils::CONFIG_ERROR;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

/// Determines what a match against the pattern list means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Only candidates matching a pattern are allowed, `allow` in the filter file
    Allow,
    /// Candidates matching a pattern are rejected, `deny` in the filter file
    Deny,
}

impl FilterMode {
    fn parse(line: &str) -> Option<Self> {
        match line {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }
}

/// How patterns are compared against a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The candidate has to be identical to a pattern (IP addresses)
    Exact,
    /// A pattern has to be contained in the candidate (User-Agent header)
    Substring,
}

/// An allow or deny list of patterns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterList {
    mode: FilterMode,
    kind: MatchKind,
    patterns: Vec<String>,
}

impl FilterList {
    /// Creates a list with the given mode and patterns.
    pub fn new(mode: FilterMode, kind: MatchKind, patterns: Vec<String>) -> Self {
        Self {
            mode,
            kind,
            patterns,
        }
    }

    /// Creates the list an empty filter file results in: deny mode without patterns, meaning that
    /// everything is allowed.
    pub fn empty(kind: MatchKind) -> Self {
        Self::new(FilterMode::Deny, kind, Vec::new())
    }

    /// Mode of the list
    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Match kind of the list
    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    /// Patterns in the order they were listed
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Parses the contents of a filter file.
    ///
    /// Anything following `#` on a line is a comment. Lines are trimmed and empty lines skipped.
    /// The first remaining line has to be either `allow` or `deny`, otherwise an error of type
    /// [`CONFIG_ERROR`] is returned. Contents without any remaining lines produce an
    /// [empty list](Self::empty).
    pub fn parse(contents: &str, kind: MatchKind) -> Result<Self, Box<Error>> {
        let mut lines = contents
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty());

        let Some(first) = lines.next() else {
            return Ok(Self::empty(kind));
        };

        let mode = FilterMode::parse(first).ok_or_else(|| {
            Error::explain(
                CONFIG_ERROR,
                format!("invalid filter mode `{first}`, use allow|deny"),
            )
        })?;

        Ok(Self::new(mode, kind, lines.map(str::to_owned).collect()))
    }

    /// Loads a filter file, creating it empty if it doesn't exist yet.
    pub fn load(path: &Path, kind: MatchKind) -> Result<Self, Box<Error>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                Error::because(
                    ErrorType::FileOpenError,
                    format!("failed creating directory {}", parent.display()),
                    err,
                )
            })?;
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("filter file {} missing, creating it", path.display());
                if let Err(err) = OpenOptions::new().write(true).create_new(true).open(path) {
                    if err.kind() != ErrorKind::AlreadyExists {
                        return Err(Error::because(
                            ErrorType::FileOpenError,
                            format!("failed creating filter file {}", path.display()),
                            err,
                        ));
                    }
                }
                String::new()
            }
            Err(err) => {
                return Err(Error::because(
                    ErrorType::FileReadError,
                    format!("failed reading filter file {}", path.display()),
                    err,
                ))
            }
        };

        Self::parse(&contents, kind).map_err(|err| {
            Error::because(
                CONFIG_ERROR,
                format!("invalid filter file {}", path.display()),
                err,
            )
        })
    }

    /// Checks whether the candidate passes this list.
    pub fn is_allowed(&self, candidate: &str) -> bool {
        let listed = match self.kind {
            MatchKind::Exact => self.patterns.iter().any(|pattern| pattern == candidate),
            MatchKind::Substring => self
                .patterns
                .iter()
                .any(|pattern| candidate.contains(pattern.as_str())),
        };

        match self.mode {
            FilterMode::Allow => listed,
            FilterMode::Deny => !listed,
        }
    }
}
