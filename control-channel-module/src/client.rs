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

//! Client side of the control channel

use module_utils::pingora::{Error, ErrorType};
use module_utils::PROTOCOL_ERROR;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::commands::MAX_FRAME_SIZE;

async fn connect(path: &Path) -> Result<UnixStream, Box<Error>> {
    UnixStream::connect(path).await.map_err(|err| {
        Error::because(
            ErrorType::ConnectError,
            format!("failed connecting to control socket {}", path.display()),
            err,
        )
    })
}

async fn exchange(stream: &mut UnixStream, command: &str) -> Result<bool, Box<Error>> {
    if command.is_empty() || command.len() > MAX_FRAME_SIZE {
        return Err(Error::explain(
            PROTOCOL_ERROR,
            format!("commands have to be between 1 and {MAX_FRAME_SIZE} bytes long"),
        ));
    }

    stream
        .write_all(command.as_bytes())
        .await
        .map_err(|err| Error::because(ErrorType::WriteError, "failed sending command", err))?;
    let response = stream
        .read_u8()
        .await
        .map_err(|err| Error::because(ErrorType::ReadError, "no response to command", err))?;
    Ok(response == 1)
}

/// Sends a single command to the server listening on `path`. Returns `true` if the command was
/// applied.
pub async fn send_command(path: &Path, command: &str) -> Result<bool, Box<Error>> {
    let mut stream = connect(path).await?;
    exchange(&mut stream, command).await
}

/// Sends each line of `input` as a command over a single connection and writes the outcome to
/// `output`. Empty lines are skipped. Returns once `input` is exhausted.
pub async fn interactive<R, W>(path: &Path, input: R, mut output: W) -> Result<(), Box<Error>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stream = connect(path).await?;
    let mut lines = input.lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|err| Error::because(ErrorType::ReadError, "failed reading input", err))?
    {
        let command = line.trim();
        if command.is_empty() {
            continue;
        }

        let message = match exchange(&mut stream, command).await {
            Ok(true) => format!("{command}: applied\n"),
            Ok(false) => format!("{command}: rejected\n"),
            Err(err) if err.etype == PROTOCOL_ERROR => format!("{command}: {err}\n"),
            Err(err) => return Err(err),
        };
        output
            .write_all(message.as_bytes())
            .await
            .map_err(|err| Error::because(ErrorType::WriteError, "failed writing output", err))?;
    }

    output
        .flush()
        .await
        .map_err(|err| Error::because(ErrorType::WriteError, "failed writing output", err))
}
