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

//! Standard responses for various conditions

use http::{header, HeaderName, HeaderValue, StatusCode};

use crate::pingora::{Error, ResponseHeader, Session};

/// Responds with the given status code and an empty body.
///
/// Any `extra_headers` are added to the response as is, e.g. CORS headers.
pub async fn status_response(
    session: &mut Session,
    status: StatusCode,
    extra_headers: &[(HeaderName, HeaderValue)],
) -> Result<(), Box<Error>> {
    let mut header = ResponseHeader::build(status, Some(2 + extra_headers.len()))?;
    header.append_header(header::CONTENT_LENGTH, "0")?;
    for (name, value) in extra_headers {
        header.append_header(name.clone(), value.clone())?;
    }

    session.write_response_header(Box::new(header), true).await
}
