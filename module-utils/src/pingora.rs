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

//! Exposes the types from the `pingora` crate the miniws crates work with, so that typical
//! modules no longer need it as a direct dependency.

use std::io::{Cursor, Seek, SeekFrom, Write};

pub use pingora::http::{RequestHeader, ResponseHeader};
pub use pingora::protocols::l4::socket::SocketAddr;
pub use pingora::proxy::{http_proxy_service, ProxyHttp, Session};
pub use pingora::server::configuration::{Opt as ServerOpt, ServerConf};
pub use pingora::server::{Server, ShutdownWatch};
pub use pingora::services::background::{background_service, BackgroundService};
pub use pingora::upstreams::peer::HttpPeer;
pub use pingora::{Error, ErrorType};

/// Returns the client IP address of a session as a string, without the port.
///
/// Connections over Unix sockets have no IP address, `None` is returned for these.
pub fn client_ip(session: &Session) -> Option<String> {
    match session.client_addr()? {
        SocketAddr::Inet(addr) => Some(addr.ip().to_string()),
        #[cfg(unix)]
        SocketAddr::Unix(_) => None,
    }
}

/// Creates a new Pingora session for tests with the given request header
pub async fn create_test_session(header: RequestHeader) -> Session {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let _ = cursor.write(b"GET / HTTP/1.1\r\n");
    let _ = cursor.write(b"Connection: close\r\n");
    let _ = cursor.write(b"\r\n");
    let _ = cursor.seek(SeekFrom::Start(0));

    let mut session = Session::new_h1(Box::new(cursor));
    assert!(matches!(session.read_request().await, Ok(true)));
    *session.req_header_mut() = header;

    session
}
