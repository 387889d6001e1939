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

use async_trait::async_trait;
use log::{debug, error, info, warn};
use module_utils::pingora::{BackgroundService, Error, ErrorType, ShutdownWatch};
use module_utils::signal::{on_signals, SignalKind};
use std::io::ErrorKind;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener as StdUnixListener, UnixStream as StdUnixStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use crate::commands::{Command, CommandTable, MAX_FRAME_SIZE};

/// Removes the control socket once the process receives `SIGINT` or `SIGTERM`. This needs to run
/// within a Tokio runtime.
pub fn remove_on_termination(path: &Path) {
    let path = path.to_owned();
    on_signals(
        &[SignalKind::interrupt(), SignalKind::terminate()],
        move |kind| {
            debug!(
                "signal {} received, removing control socket {}",
                kind.as_raw_value(),
                path.display()
            );
            let _ = std::fs::remove_file(&path);
            false
        },
    );
}

/// Makes sure that a control server can bind to the path.
///
/// If something exists at the path and accepts connections, another server is running there and
/// an error is returned. A socket nobody listens on is a leftover and will be removed, anything
/// else at the path is an error.
pub fn prepare_endpoint(path: &Path) -> Result<(), Box<Error>> {
    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        return Ok(());
    };

    if !metadata.file_type().is_socket() {
        return Err(Error::explain(
            ErrorType::BindError,
            format!("{} exists and is not a socket", path.display()),
        ));
    }

    if StdUnixStream::connect(path).is_ok() {
        return Err(Error::explain(
            ErrorType::BindError,
            format!(
                "another server is already listening on control socket {}",
                path.display()
            ),
        ));
    }

    debug!("removing stale control socket {}", path.display());
    match std::fs::remove_file(path) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(Error::because(
            ErrorType::BindError,
            format!("failed removing stale control socket {}", path.display()),
            err,
        )),
    }
}

async fn handle_connection(mut stream: UnixStream, table: &CommandTable) -> std::io::Result<()> {
    let mut buf = vec![0; MAX_FRAME_SIZE];
    loop {
        let len = stream.read(&mut buf).await?;
        if len == 0 {
            // Peer closed the connection
            return Ok(());
        }

        let applied = match Command::parse(&buf[..len]) {
            Ok(command) => table.dispatch(&command),
            Err(err) => {
                warn!("malformed control frame: {err}");
                false
            }
        };
        stream.write_all(&[u8::from(applied)]).await?;
    }
}

/// Listens on a Unix socket and runs received commands
///
/// The socket file is removed when the server is dropped.
#[derive(Debug)]
pub struct ControlServer {
    path: PathBuf,
    listener: Option<StdUnixListener>,
    table: Arc<CommandTable>,
}

impl ControlServer {
    /// Binds to the Unix socket at the given path, see [`prepare_endpoint`]. This doesn't need a
    /// Tokio runtime, connections will only be accepted once [`ControlServer::serve`] runs.
    pub fn bind(path: impl Into<PathBuf>, table: CommandTable) -> Result<Self, Box<Error>> {
        let path = path.into();
        prepare_endpoint(&path)?;

        let listener = StdUnixListener::bind(&path).map_err(|err| {
            Error::because(
                ErrorType::BindError,
                format!("failed binding control socket {}", path.display()),
                err,
            )
        })?;
        listener.set_nonblocking(true).map_err(|err| {
            Error::because(
                ErrorType::BindError,
                "failed switching control socket to non-blocking mode",
                err,
            )
        })?;
        info!("control channel listening on {}", path.display());

        Ok(Self {
            path,
            listener: Some(listener),
            table: Arc::new(table),
        })
    }

    /// Path of the Unix socket
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accepts connections until the shutdown notification is received. Each connection is
    /// handled by its own task.
    pub async fn serve(mut self, mut shutdown: ShutdownWatch) -> Result<(), Box<Error>> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| Error::explain(ErrorType::InternalError, "control server not bound"))
            .and_then(|listener| {
                UnixListener::from_std(listener).map_err(|err| {
                    Error::because(
                        ErrorType::BindError,
                        "failed registering control socket",
                        err,
                    )
                })
            })?;

        remove_on_termination(&self.path);

        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, _)) => {
                        let table = self.table.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, &table).await {
                                debug!("control connection failed: {err}");
                            }
                        });
                    }
                    Err(err) => error!("failed accepting control connection: {err}"),
                },
                _ = shutdown.changed() => {
                    debug!("control channel shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                warn!(
                    "failed removing control socket {}: {err}",
                    self.path.display()
                );
            }
        }
    }
}

/// Runs a [`ControlServer`] as a Pingora background service
#[derive(Debug)]
pub struct ControlService {
    server: Mutex<Option<ControlServer>>,
}

impl From<ControlServer> for ControlService {
    fn from(server: ControlServer) -> Self {
        Self {
            server: Mutex::new(Some(server)),
        }
    }
}

#[async_trait]
impl BackgroundService for ControlService {
    async fn start(&self, shutdown: ShutdownWatch) {
        let server = self
            .server
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(server) = server {
            if let Err(err) = server.serve(shutdown).await {
                error!("control channel failed: {err}");
            }
        } else {
            warn!("control channel started twice, ignoring");
        }
    }
}
