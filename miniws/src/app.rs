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

//! The application implementing the Pingora Proxy interface

use async_trait::async_trait;
use http::{header, HeaderName, HeaderValue, Method, StatusCode};
use module_utils::pingora::{client_ip, Error, ErrorType, HttpPeer, ProxyHttp, Session};
use module_utils::standard_response::status_response;
use rotating_log_module::LogRecord;
use static_files_module::{Lookup, StaticFilesHandler};
use std::sync::Arc;
use std::time::SystemTime;

use crate::context::ServerContext;

const CORS_ALLOW_METHODS: &str = "POST, GET, OPTIONS, PUT, DELETE";
const CORS_ALLOW_HEADERS: &str =
    "Accept, Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, Authorization";

/// Per-request state
#[derive(Debug)]
pub(crate) struct RequestCtx {
    time: SystemTime,
}

/// Admits requests and serves them from the static files root
#[derive(Debug)]
pub(crate) struct MiniwsApp {
    context: Arc<ServerContext>,
    static_files: StaticFilesHandler,
}

impl MiniwsApp {
    pub(crate) fn new(context: Arc<ServerContext>, static_files: StaticFilesHandler) -> Self {
        Self {
            context,
            static_files,
        }
    }
}

/// CORS headers echoing the request's `Origin` header, empty if there is none.
fn cors_headers(session: &Session) -> Vec<(HeaderName, HeaderValue)> {
    let Some(origin) = session.req_header().headers.get(header::ORIGIN) else {
        return Vec::new();
    };

    vec![
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone()),
        (
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        ),
        (
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        ),
    ]
}

#[async_trait]
impl ProxyHttp for MiniwsApp {
    type CTX = RequestCtx;

    fn new_ctx(&self) -> Self::CTX {
        RequestCtx {
            time: SystemTime::now(),
        }
    }

    async fn request_filter(
        &self,
        session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<bool, Box<Error>> {
        let ip = client_ip(session);
        let user_agent = session
            .req_header()
            .headers
            .get(header::USER_AGENT)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
        let cors = cors_headers(session);

        let admission = self.context.admit(ip.as_deref(), user_agent.as_deref());
        if let Some(status) = admission.status() {
            status_response(session, status, &cors).await?;
            return Ok(true);
        }

        if session.req_header().method == Method::OPTIONS {
            status_response(session, StatusCode::NO_CONTENT, &cors).await?;
            return Ok(true);
        }

        if let Lookup::Failed { reason, .. } = self.static_files.handle(session, &cors).await? {
            self.context.log().log_error(reason);
        }
        Ok(true)
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>, Box<Error>> {
        Err(Error::new(ErrorType::HTTPStatus(404)))
    }

    async fn logging(&self, session: &mut Session, _e: Option<&Error>, ctx: &mut Self::CTX) {
        let req = session.req_header();
        let method = &req.method;
        let path = req.uri.path();
        let version = &req.version;

        let record = LogRecord {
            remote_addr: client_ip(session),
            auth_user: None,
            time: ctx.time,
            request: format!("{method} {path} {version:?}"),
            status: session
                .response_written()
                .map_or(0, |resp| resp.status.as_u16()),
            bytes_sent: session.body_bytes_sent(),
            referer: req.headers.get(header::REFERER).cloned(),
            user_agent: req.headers.get(header::USER_AGENT).cloned(),
        };
        self.context.log().log_access(record);
    }
}
