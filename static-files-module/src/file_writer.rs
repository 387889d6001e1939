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

//! Writing files to Pingora session.

use bytes::BytesMut;
use log::error;
use module_utils::pingora::{Error, ErrorType, Session};
use std::cmp::min;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUFFER_SIZE: usize = 64 * 1024;

/// Writes `size` bytes of the file as response body, the response header has to be written
/// already.
pub(crate) async fn file_response(
    session: &mut Session,
    path: &Path,
    size: u64,
) -> Result<(), Box<Error>> {
    let mut file = File::open(path).map_err(|err| {
        error!("failed opening file {}: {err}", path.display());
        Error::because(
            ErrorType::FileOpenError,
            format!("failed opening {}", path.display()),
            err,
        )
    })?;

    let mut remaining = size;
    while remaining > 0 {
        let mut buf = BytesMut::zeroed(min(remaining, BUFFER_SIZE as u64) as usize);
        let len = file.read(buf.as_mut()).map_err(|err| {
            error!("failed reading data from {}: {err}", path.display());
            Error::because(
                ErrorType::FileReadError,
                format!("failed reading {}", path.display()),
                err,
            )
        })?;

        if len == 0 {
            error!("file ended with {remaining} bytes left to be written");
            return Err(Error::new(ErrorType::ReadError));
        }

        buf.truncate(len);
        remaining -= len as u64;
        session
            .write_response_body(Some(buf.freeze()), remaining == 0)
            .await?;
    }

    Ok(())
}
