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

//! # Module helpers
//!
//! This crate contains the pieces shared by the miniws crates: re-exports of the Pingora types
//! the modules need, loading of YAML configuration files, merging of configuration structures and
//! the error types used for failures that Pingora has no dedicated error type for.
//!
//! Every module exposes a configuration structure implementing [`serde::Deserialize`] and
//! [`Default`]. The [`merge_conf`] macro combines them into one structure that can be loaded from
//! a single configuration file:
//!
//! ```rust
//! use module_utils::{merge_conf, FromYaml};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! #[serde(default)]
//! struct ListenConf {
//!     listen: Vec<String>,
//! }
//!
//! #[derive(Debug, Default, Deserialize)]
//! #[serde(default)]
//! struct RootConf {
//!     root: String,
//! }
//!
//! merge_conf! {
//!     struct Conf {
//!         listen: ListenConf,
//!         root: RootConf,
//!     }
//! }
//!
//! let conf = Conf::from_yaml("listen: ['127.0.0.1:8080']\nroot: /var/www").unwrap();
//! assert_eq!(conf.listen.listen, vec!["127.0.0.1:8080".to_owned()]);
//! assert_eq!(conf.root.root, "/var/www");
//! ```

pub mod pingora;
pub mod signal;
pub mod standard_response;

use log::trace;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::pingora::{Error, ErrorType};

/// Error type for configuration files with invalid contents
pub const CONFIG_ERROR: ErrorType = ErrorType::Custom("ConfigError");

/// Error type for failures packaging rotated log files
pub const COMPRESSION_ERROR: ErrorType = ErrorType::Custom("CompressionError");

/// Error type for malformed control channel frames
pub const PROTOCOL_ERROR: ErrorType = ErrorType::Custom("ProtocolError");

/// Trait for configuration structures that can be loaded from YAML files. This trait has a blanket
/// implementation for any structure implementing [`serde::Deserialize`].
pub trait FromYaml {
    /// Loads configuration from a YAML file.
    fn load_from_yaml<P>(path: P) -> Result<Self, Box<Error>>
    where
        P: AsRef<Path>,
        Self: Sized;

    /// Loads configuration from a YAML string.
    fn from_yaml<S>(yaml_conf: S) -> Result<Self, Box<Error>>
    where
        S: AsRef<str>,
        Self: Sized;
}

impl<D> FromYaml for D
where
    D: DeserializeOwned + Debug + ?Sized,
{
    fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<Error>> {
        let file = File::open(path.as_ref()).map_err(|err| {
            Error::because(
                ErrorType::FileOpenError,
                format!(
                    "failed opening configuration file {}",
                    path.as_ref().display()
                ),
                err,
            )
        })?;
        let reader = BufReader::new(file);

        let conf = serde_yaml::from_reader(reader).map_err(|err| {
            Error::because(
                ErrorType::FileReadError,
                format!(
                    "failed reading configuration file {}",
                    path.as_ref().display()
                ),
                err,
            )
        })?;
        trace!("Loaded configuration file: {conf:#?}");

        Ok(conf)
    }

    fn from_yaml<S: AsRef<str>>(yaml_conf: S) -> Result<Self, Box<Error>> {
        let conf = serde_yaml::from_str(yaml_conf.as_ref()).map_err(|err| {
            Error::because(CONFIG_ERROR, "failed parsing configuration", err)
        })?;
        trace!("Loaded configuration: {conf:#?}");

        Ok(conf)
    }
}

/// This macro merges multiple structures implementing [`serde::Deserialize`] and [`Default`] into
/// a structure containing all of them.
///
/// The structure of the expected configuration file is flattened, so that the configuration
/// settings from each component are still expected to be found on the top level.
///
/// *Note*: Support for `struct` syntax is limited when it comes to generics.
#[macro_export]
macro_rules! merge_conf {
    (
        $(#[$struct_attr:meta])*
        $struct_vis:vis struct $struct_name:ident
        {
            $(
                $(#[$field_attr:meta])*
                $field_vis:vis $field_name:ident: $field_type:ty,
            )*
        }
    ) => {
        $(#[$struct_attr])*
        #[derive(::std::fmt::Debug, ::std::default::Default, ::serde::Deserialize)]
        #[serde(default)]
        $struct_vis struct $struct_name
        {
            $(
                #[serde(flatten)]
                $(#[$field_attr])*
                $field_vis $field_name: $field_type,
            )*
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde::Deserialize;
    use std::io::Write;
    use test_log::test;

    #[derive(Debug, Default, PartialEq, Eq, Deserialize)]
    #[serde(default)]
    struct First {
        value: u32,
    }

    #[derive(Debug, Default, PartialEq, Eq, Deserialize)]
    #[serde(default)]
    struct Second {
        name: String,
        flag: bool,
    }

    merge_conf! {
        struct Merged {
            first: First,
            second: Second,
        }
    }

    #[test]
    fn merged_conf() {
        let conf = Merged::from_yaml("value: 12\nname: test").unwrap();
        assert_eq!(conf.first, First { value: 12 });
        assert_eq!(
            conf.second,
            Second {
                name: "test".to_owned(),
                flag: false,
            }
        );

        let conf = Merged::from_yaml("{}").unwrap();
        assert_eq!(conf.first, First::default());
        assert_eq!(conf.second, Second::default());
    }

    #[test]
    fn invalid_yaml() {
        let err = Merged::from_yaml("value: [").unwrap_err();
        assert_eq!(err.etype, CONFIG_ERROR);
    }

    #[test]
    fn conf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.yaml");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "value: 3\nflag: true").unwrap();
        drop(file);

        let conf = Merged::load_from_yaml(&path).unwrap();
        assert_eq!(conf.first.value, 3);
        assert!(conf.second.flag);

        let err = Merged::load_from_yaml(dir.path().join("missing.yaml")).unwrap_err();
        assert_eq!(err.etype, ErrorType::FileOpenError);
    }
}
