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

//! Handler answering requests with files from the root directory.

use http::{header, HeaderName, HeaderValue, Method, StatusCode};
use log::{debug, info, warn};
use module_utils::pingora::{Error, ErrorType, ResponseHeader, Session};
use module_utils::standard_response::status_response;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::configuration::StaticFilesConf;
use crate::file_writer::file_response;
use crate::path::resolve_uri;

/// Outcome of mapping a request to a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The request maps to this regular file
    Found(PathBuf),
    /// The request cannot be served
    Failed {
        /// Response status to send
        status: StatusCode,
        /// Description of the problem for the error log
        reason: String,
    },
}

impl Lookup {
    fn failed(status: StatusCode, reason: impl Into<String>) -> Self {
        Self::Failed {
            status,
            reason: reason.into(),
        }
    }
}

/// Serves files from the root directory
#[derive(Debug)]
pub struct StaticFilesHandler {
    conf: StaticFilesConf,
}

impl StaticFilesHandler {
    /// Creates a new handler with given configuration. The root directory path is canonicalized,
    /// an error is returned if it doesn’t exist, isn’t a directory or cannot be read.
    pub fn new(mut conf: StaticFilesConf) -> Result<Self, Box<Error>> {
        let root = conf.root.canonicalize().map_err(|err| {
            Error::because(
                ErrorType::FileOpenError,
                format!("failed accessing root directory {}", conf.root.display()),
                err,
            )
        })?;

        if !root.is_dir() {
            return Err(Error::explain(
                ErrorType::FileOpenError,
                format!("root path {} is not a directory", root.display()),
            ));
        }

        fs::read_dir(&root).map_err(|err| {
            Error::because(
                ErrorType::FileReadError,
                format!("root directory {} cannot be read", root.display()),
                err,
            )
        })?;

        conf.root = root;
        debug!("Initialized static files handler, settings: {conf:#?}");
        Ok(Self { conf })
    }

    /// Provides read-only access to the handler’s configuration.
    pub fn conf(&self) -> &StaticFilesConf {
        &self.conf
    }

    /// Maps a URI path to a file within the root directory.
    pub fn lookup(&self, uri_path: &str) -> Lookup {
        let mut path = match resolve_uri(uri_path, &self.conf.root) {
            Ok(path) => path,
            Err(err) => {
                let status = match err.kind() {
                    ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                return Lookup::failed(status, format!("cannot resolve {uri_path}: {err}"));
            }
        };

        if path.is_dir() {
            let index = self
                .conf
                .index_file
                .iter()
                .map(|name| path.join(name))
                .find(|candidate| candidate.is_file());
            match index {
                Some(index) => path = index,
                None => {
                    return Lookup::failed(
                        StatusCode::NOT_FOUND,
                        format!("no index file in directory {}", path.display()),
                    )
                }
            }
        }

        if !path.is_file() {
            return Lookup::failed(
                StatusCode::FORBIDDEN,
                format!("{} is not a regular file", path.display()),
            );
        }

        Lookup::Found(path)
    }

    /// Handles the current request, writing a response in every case. The `extra_headers` are
    /// added to any response sent.
    ///
    /// The lookup result is returned so that the caller can record failures. An error is only
    /// returned if writing the response failed.
    pub async fn handle(
        &self,
        session: &mut Session,
        extra_headers: &[(HeaderName, HeaderValue)],
    ) -> Result<Lookup, Box<Error>> {
        let method = session.req_header().method.clone();
        let lookup = if method == Method::GET || method == Method::HEAD {
            self.lookup(session.req_header().uri.path())
        } else {
            Lookup::failed(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("method {method} not allowed"),
            )
        };

        let path = match &lookup {
            Lookup::Found(path) => path,
            Lookup::Failed { status, reason } => {
                warn!("{reason}");
                status_response(session, *status, extra_headers).await?;
                return Ok(lookup);
            }
        };

        let size = match path.metadata() {
            Ok(meta) => meta.len(),
            Err(err) => {
                let lookup = Lookup::failed(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("failed retrieving metadata for {}: {err}", path.display()),
                );
                status_response(session, StatusCode::INTERNAL_SERVER_ERROR, extra_headers)
                    .await?;
                return Ok(lookup);
            }
        };

        info!("serving file {}", path.display());

        let content_type = mime_guess::from_path(path).first_or_octet_stream();
        let mut header = ResponseHeader::build(StatusCode::OK, Some(2 + extra_headers.len()))?;
        header.append_header(header::CONTENT_LENGTH, size.to_string())?;
        header.append_header(header::CONTENT_TYPE, content_type.as_ref())?;
        for (name, value) in extra_headers {
            header.append_header(name.clone(), value.clone())?;
        }

        let headers_only = method == Method::HEAD || size == 0;
        session
            .write_response_header(Box::new(header), headers_only)
            .await?;
        if !headers_only {
            file_response(session, path, size).await?;
        }

        Ok(lookup)
    }
}
