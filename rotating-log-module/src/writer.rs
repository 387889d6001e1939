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

//! Handles writing logs on a separate thread

use log::{debug, error, trace};
use module_utils::pingora::{Error, ErrorType};
use module_utils::signal::{on_signals, SignalKind};
use module_utils::COMPRESSION_ERROR;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use crate::configuration::LogConf;
use crate::record::LogRecord;
use crate::rotation::{new_suffix, rotate_if_needed_with};
use crate::{ACCESS_LOG, ERROR_LOG};

#[derive(Debug)]
enum WriterMessage {
    Access(Box<LogRecord>),
    Error(String),
    Reopen,
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
struct LogFile {
    path: PathBuf,
    max_bytes: u64,
    suffix: fn() -> String,
    file: Option<File>,
}

impl LogFile {
    fn new(log_dir: &Path, name: &str, max_bytes: u64) -> Self {
        Self {
            path: log_dir.join(name),
            max_bytes,
            suffix: new_suffix,
            file: None,
        }
    }

    fn open(&mut self) -> Result<&mut File, Box<Error>> {
        if self.file.is_some() && !self.path.exists() {
            // Moved away by somebody else
            self.file = None;
        }

        if self.file.is_none() {
            let file = File::options()
                .append(true)
                .create(true)
                .open(&self.path)
                .map_err(|err| {
                    Error::because(
                        ErrorType::FileOpenError,
                        format!("failed opening log file {}", self.path.display()),
                        err,
                    )
                })?;
            self.file = Some(file);
        }

        self.file.as_mut().ok_or_else(|| {
            Error::explain(ErrorType::InternalError, "log file handle missing")
        })
    }

    fn append(&mut self, data: &[u8]) -> Result<(), Box<Error>> {
        let path = self.path.clone();
        if let Err(err) = self.open()?.write_all(data) {
            self.file = None;
            return Err(Error::because(
                ErrorType::FileWriteError,
                format!("failed writing to log file {}", path.display()),
                err,
            ));
        }

        match rotate_if_needed_with(&self.path, self.max_bytes, self.suffix) {
            Ok(None) => Ok(()),
            Ok(Some(archive)) => {
                debug!("rotated {} into {}", path.display(), archive.display());
                self.file = None;
                Ok(())
            }
            Err(err) => {
                self.file = None;
                Err(err)
            }
        }
    }
}

#[derive(Debug)]
struct WriterState {
    log_dir: PathBuf,
    access: LogFile,
    error: LogFile,
    buf: Vec<u8>,
}

impl WriterState {
    fn new(conf: &LogConf) -> Self {
        Self {
            log_dir: conf.log_dir.clone(),
            access: LogFile::new(&conf.log_dir, ACCESS_LOG, conf.access_log_threshold()),
            error: LogFile::new(&conf.log_dir, ERROR_LOG, conf.error_log_threshold()),
            buf: Vec::with_capacity(4096),
        }
    }

    fn create_dir(&self) -> Result<(), Box<Error>> {
        fs::create_dir_all(&self.log_dir).map_err(|err| {
            Error::because(
                ErrorType::FileOpenError,
                format!("failed creating log directory {}", self.log_dir.display()),
                err,
            )
        })
    }

    fn write_access(&mut self, record: &LogRecord) {
        self.buf.truncate(0);
        record.write_to(&mut self.buf, &chrono::Local);

        let result = self
            .create_dir()
            .and_then(|_| self.access.append(&self.buf));
        if let Err(err) = result {
            error!("access log: {err}");
            if err.etype == COMPRESSION_ERROR {
                self.write_error(&err.to_string());
            }
        }
    }

    fn write_error(&mut self, message: &str) {
        let mut line = Vec::with_capacity(message.len() + 1);
        line.extend_from_slice(message.as_bytes());
        line.push(b'\n');

        let result = self.create_dir().and_then(|_| self.error.append(&line));
        if let Err(err) = result {
            error!("error log: {err}");
        }
    }

    fn run(mut self, mut receiver: UnboundedReceiver<WriterMessage>) {
        while let Some(message) = receiver.blocking_recv() {
            match message {
                WriterMessage::Access(record) => self.write_access(&record),
                WriterMessage::Error(message) => self.write_error(&message),
                WriterMessage::Reopen => {
                    trace!("reopening log files");
                    self.access.file = None;
                    self.error.file = None;
                }
                WriterMessage::Flush(sender) => {
                    let _ = sender.send(());
                }
            }
        }
        trace!("log writer shutting down");
    }
}

type PendingWriter = (WriterState, UnboundedReceiver<WriterMessage>);

/// Writes access and error logs on a dedicated thread
///
/// Cloning a `LogWriter` produces another handle to the same writer thread. The thread exits once
/// all handles are dropped.
#[derive(Debug, Clone)]
pub struct LogWriter {
    sender: UnboundedSender<WriterMessage>,
    pending: Arc<Mutex<Option<PendingWriter>>>,
}

impl LogWriter {
    /// Creates a writer for the configured log files.
    ///
    /// The writer thread only starts with the first message, a writer created before the process
    /// forks into the background will still work afterwards. The log directory isn't touched until
    /// the first message is written.
    pub fn new(conf: &LogConf) -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            sender,
            pending: Arc::new(Mutex::new(Some((WriterState::new(conf), receiver)))),
        }
    }

    fn start(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((state, receiver)) = pending {
            trace!("starting log writer thread");
            if let Err(err) = thread::Builder::new()
                .name("log-writer".to_owned())
                .spawn(move || state.run(receiver))
            {
                error!("failed starting log writer thread: {err}");
            }
        }
    }

    fn send(&self, message: WriterMessage) {
        self.start();
        if let Err(err) = self.sender.send(message) {
            error!("Failed logging, writer thread crashed? {err}");
        }
    }

    /// Queues a request for the access log.
    pub fn log_access(&self, record: LogRecord) {
        self.send(WriterMessage::Access(Box::new(record)));
    }

    /// Queues a message for the error log.
    pub fn log_error(&self, message: impl Into<String>) {
        self.send(WriterMessage::Error(message.into()));
    }

    /// Makes the writer close its log files, they will be opened again on next write.
    pub fn reopen(&self) {
        self.send(WriterMessage::Reopen);
    }

    /// Waits until all messages queued previously have been written.
    pub async fn flush(&self) {
        let (sender, receiver) = oneshot::channel();
        self.send(WriterMessage::Flush(sender));
        let _ = receiver.await;
    }

    /// Reopens log files whenever the process receives `SIGHUP` or `SIGUSR1`. This needs to run
    /// within a Tokio runtime.
    pub fn reopen_on_signals(&self) {
        let sender = self.sender.clone();
        on_signals(
            &[SignalKind::hangup(), SignalKind::user_defined1()],
            move |_| sender.send(WriterMessage::Reopen).is_ok(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::HeaderValue;
    use std::time::SystemTime;
    use test_log::test;

    fn record(path: &str) -> LogRecord {
        LogRecord {
            remote_addr: Some("192.0.2.1".to_owned()),
            auth_user: None,
            time: SystemTime::now(),
            request: format!("GET {path} HTTP/1.1"),
            status: 200,
            bytes_sent: 1234,
            referer: None,
            user_agent: Some(HeaderValue::from_static("curl/8.5.0")),
        }
    }

    fn archives(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.to_string_lossy().ends_with(".tar.gz"))
            .collect()
    }

    #[test(tokio::test)]
    async fn directory_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let conf = LogConf {
            log_dir: dir.path().join("nested").join("logs"),
            ..Default::default()
        };

        let writer = LogWriter::new(&conf);
        writer.flush().await;
        assert!(!conf.log_dir.exists());

        writer.log_error("first problem");
        writer.log_error(String::from("second problem"));
        writer.flush().await;
        assert_eq!(
            fs::read_to_string(conf.log_dir.join(ERROR_LOG)).unwrap(),
            "first problem\nsecond problem\n"
        );
        assert!(!conf.log_dir.join(ACCESS_LOG).exists());
    }

    #[test(tokio::test)]
    async fn access_log() {
        let dir = tempfile::tempdir().unwrap();
        let conf = LogConf {
            log_dir: dir.path().to_owned(),
            ..Default::default()
        };

        let writer = LogWriter::new(&conf);
        writer.log_access(record("/"));
        writer.log_access(record("/style.css"));
        writer.flush().await;

        let contents = fs::read_to_string(dir.path().join(ACCESS_LOG)).unwrap();
        let lines = contents.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("192.0.2.1 - - ["));
        assert!(lines[0].ends_with("] \"GET / HTTP/1.1\" 200 1234 \"-\" \"curl/8.5.0\""));
        assert!(lines[1].contains("\"GET /style.css HTTP/1.1\""));
    }

    #[test(tokio::test)]
    async fn rotation() {
        let dir = tempfile::tempdir().unwrap();
        let line_length = record("/0").to_line().len() as u64;
        let conf = LogConf {
            log_dir: dir.path().to_owned(),
            max_access_log_bytes: Some(line_length * 5 / 2),
            ..Default::default()
        };

        let writer = LogWriter::new(&conf);
        for i in 0..3 {
            writer.log_access(record(&format!("/{i}")));
        }
        writer.flush().await;

        assert_eq!(fs::read(dir.path().join(ACCESS_LOG)).unwrap(), b"");
        assert_eq!(archives(dir.path()).len(), 1);
        assert!(!dir.path().join(ERROR_LOG).exists());

        // Later writes go into the fresh file
        writer.log_access(record("/3"));
        writer.flush().await;
        let contents = fs::read_to_string(dir.path().join(ACCESS_LOG)).unwrap();
        assert!(contents.contains("\"GET /3 HTTP/1.1\""));
        assert_eq!(contents.lines().count(), 1);
        assert_eq!(archives(dir.path()).len(), 1);

        // Leftover uncompressed files would indicate a problem
        let names = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .filter(|name| !name.ends_with(".tar.gz"))
            .collect::<Vec<_>>();
        assert_eq!(names, vec![ACCESS_LOG.to_owned()]);
    }

    #[test]
    fn compression_failure() {
        let dir = tempfile::tempdir().unwrap();
        let line_length = record("/0").to_line().len() as u64;
        let mut state = WriterState::new(&LogConf {
            log_dir: dir.path().to_owned(),
            max_access_log_bytes: Some(line_length / 2),
            ..Default::default()
        });
        state.access.suffix = || "stuck".to_owned();

        // A directory in place of the archive makes packing fail
        let archive = dir.path().join("access.log.stuck.tar.gz");
        fs::create_dir(&archive).unwrap();

        state.write_access(&record("/"));

        let errors = fs::read_to_string(dir.path().join(ERROR_LOG)).unwrap();
        assert_eq!(errors.lines().count(), 1);
        assert!(errors.contains("failed compressing"));
        assert!(errors.contains("access.log.stuck"));

        let rotated = fs::read_to_string(dir.path().join("access.log.stuck")).unwrap();
        assert!(rotated.contains("\"GET / HTTP/1.1\""));
        assert!(archive.is_dir());
        assert_eq!(fs::read(dir.path().join(ACCESS_LOG)).unwrap(), b"");

        // Appending continues in the fresh file
        state.access.max_bytes = u64::MAX;
        state.write_access(&record("/next"));
        let contents = fs::read_to_string(dir.path().join(ACCESS_LOG)).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("\"GET /next HTTP/1.1\""));
    }

    #[test(tokio::test)]
    async fn reopen() {
        let dir = tempfile::tempdir().unwrap();
        let conf = LogConf {
            log_dir: dir.path().to_owned(),
            ..Default::default()
        };
        let path = dir.path().join(ERROR_LOG);

        let writer = LogWriter::new(&conf);
        writer.log_error("before");
        writer.flush().await;

        fs::rename(&path, dir.path().join("error.log.old")).unwrap();
        writer.reopen();
        writer.log_error("after");
        writer.flush().await;

        assert_eq!(fs::read_to_string(&path).unwrap(), "after\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("error.log.old")).unwrap(),
            "before\n"
        );
    }

    #[test(tokio::test)]
    async fn unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();
        let conf = LogConf {
            log_dir: blocker.join("logs"),
            ..Default::default()
        };

        // Failures are swallowed, the writer keeps working
        let writer = LogWriter::new(&conf);
        writer.log_access(record("/"));
        writer.log_error("lost");
        writer.flush().await;
        assert!(!conf.log_dir.exists());
    }
}
