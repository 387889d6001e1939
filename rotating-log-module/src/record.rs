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

use chrono::{DateTime, Local, TimeZone, Utc};
use http::HeaderValue;
use std::fmt::Display;
use std::io::Write;
use std::time::SystemTime;

/// Information on a completed request, written to the access log as one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Client's IP address
    pub remote_addr: Option<String>,
    /// Authenticated user name
    pub auth_user: Option<String>,
    /// Time the request was received
    pub time: SystemTime,
    /// Request line like `GET / HTTP/1.1`
    pub request: String,
    /// Response status code
    pub status: u16,
    /// Number of response body bytes sent
    pub bytes_sent: usize,
    /// Value of the `Referer` request header
    pub referer: Option<HeaderValue>,
    /// Value of the `User-Agent` request header
    pub user_agent: Option<HeaderValue>,
}

fn write_escaped(buf: &mut Vec<u8>, data: impl AsRef<[u8]>) {
    fn is_allowed(byte: u8) -> bool {
        (b' '..=b'~').contains(&byte) && byte != b'"' && byte != b'\\'
    }

    buf.push(b'"');
    for byte in data.as_ref() {
        if is_allowed(*byte) {
            buf.push(*byte);
        } else {
            let _ = write!(buf, "\\x{byte:02x}");
        }
    }
    buf.push(b'"');
}

fn write_plain(buf: &mut Vec<u8>, value: Option<&str>) {
    match value {
        Some(value) if !value.is_empty() => buf.extend_from_slice(value.as_bytes()),
        _ => buf.push(b'-'),
    }
}

fn write_header(buf: &mut Vec<u8>, value: Option<&HeaderValue>) {
    match value {
        Some(value) if !value.is_empty() => write_escaped(buf, value),
        _ => buf.extend_from_slice(b"\"-\""),
    }
}

impl LogRecord {
    /// Appends the access log line for this record to the buffer, with the time displayed in the
    /// given time zone.
    pub fn write_to<Tz>(&self, buf: &mut Vec<u8>, tz: &Tz)
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let time = DateTime::<Utc>::from(self.time)
            .with_timezone(tz)
            .format("%d/%b/%Y:%H:%M:%S %z");

        write_plain(buf, self.remote_addr.as_deref());
        buf.extend_from_slice(b" - ");
        write_plain(buf, self.auth_user.as_deref());
        let _ = write!(buf, " [{time}] ");
        write_escaped(buf, &self.request);
        let _ = write!(buf, " {} {} ", self.status, self.bytes_sent);
        write_header(buf, self.referer.as_ref());
        buf.push(b' ');
        write_header(buf, self.user_agent.as_ref());
        buf.push(b'\n');
    }

    /// Access log line for this record in local time
    pub fn to_line(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        self.write_to(&mut buf, &Local);
        buf
    }
}
