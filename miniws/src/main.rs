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

#![doc = include_str!("../README.md")]

mod app;
mod context;

use async_trait::async_trait;
use clap::Parser;
use control_channel_module::client::{interactive, send_command};
use control_channel_module::{
    CommandTable, ControlConf, ControlOpt, ControlServer, ControlService,
};
use filter_module::{FilterConf, FilterOpt, FilterStore};
use log::error;
use module_utils::pingora::{
    background_service, BackgroundService, Error, ErrorType, Server, ShutdownWatch,
};
use module_utils::{merge_conf, FromYaml};
use rate_limit_module::{ClientRateLimiter, RateLimitConf, RateLimitOpt};
use rotating_log_module::{LogConf, LogOpt, LogWriter};
use startup_module::{StartupConf, StartupOpt};
use static_files_module::{StaticFilesConf, StaticFilesHandler, StaticFilesOpt};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{stdin, stdout, BufReader};

use crate::app::MiniwsApp;
use crate::context::ServerContext;

/// Run the miniws web server
#[derive(Debug, Parser)]
#[command(name = "miniws", version)]
struct Opt {
    #[command(flatten)]
    startup: StartupOpt,
    #[command(flatten)]
    static_files: StaticFilesOpt,
    #[command(flatten)]
    filter: FilterOpt,
    #[command(flatten)]
    rate_limit: RateLimitOpt,
    #[command(flatten)]
    log: LogOpt,
    #[command(flatten)]
    control: ControlOpt,
    /// Send a command like `reload` to the running server and exit.
    #[arg(short, long, value_name = "COMMAND")]
    signal: Option<String>,
    /// Read commands from standard input, one per line, and send them to the running server.
    #[arg(long, conflicts_with = "signal")]
    control_shell: bool,
}

merge_conf! {
    /// The configuration of miniws
    struct Conf {
        startup: StartupConf,
        static_files: StaticFilesConf,
        filter: FilterConf,
        rate_limit: RateLimitConf,
        log: LogConf,
        control: ControlConf,
    }
}

/// Reopens the log files on `SIGHUP` and `SIGUSR1` for as long as the server runs
#[derive(Debug)]
struct LogReopenService {
    log: LogWriter,
}

#[async_trait]
impl BackgroundService for LogReopenService {
    async fn start(&self, mut shutdown: ShutdownWatch) {
        self.log.reopen_on_signals();
        let _ = shutdown.changed().await;
    }
}

/// Talks to a running server through its control socket instead of starting one.
fn run_client(path: &Path, command: Option<&str>) -> Result<bool, Box<Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| Error::because(ErrorType::InternalError, "failed starting runtime", err))?;

    runtime.block_on(async {
        if let Some(command) = command {
            let applied = send_command(path, command).await?;
            if applied {
                println!("Command {command} applied");
            } else {
                println!("Command {command} rejected");
            }
            Ok(applied)
        } else {
            interactive(path, BufReader::new(stdin()), stdout()).await?;
            Ok(true)
        }
    })
}

fn load_conf(opt: &Opt) -> Result<Conf, Box<Error>> {
    match &opt.startup.conf {
        Some(path) => Conf::load_from_yaml(path),
        None => Ok(Conf::default()),
    }
}

/// Resolves the paths used after startup against the current directory, the server might change
/// directories when it goes into the background.
fn absolute_paths(conf: &mut Conf) -> Result<(), Box<Error>> {
    let current_dir = std::env::current_dir().map_err(|err| {
        Error::because(
            ErrorType::InternalError,
            "failed determining current directory",
            err,
        )
    })?;

    let paths: [&mut PathBuf; 3] = [
        &mut conf.filter.config_dir,
        &mut conf.log.log_dir,
        &mut conf.control.control_socket,
    ];
    for path in paths {
        *path = current_dir.join(&*path);
    }
    Ok(())
}

/// Binds the control socket unless the server only tests its configuration.
fn bind_control(
    conf: &ControlConf,
    table: CommandTable,
    test: bool,
) -> Result<Option<ControlServer>, Box<Error>> {
    if test {
        return Ok(None);
    }

    ControlServer::bind(&conf.control_socket, table).map(Some)
}

fn run(server: Server) {
    server.run_forever();
}

fn main() -> ExitCode {
    env_logger::init();

    let opt = Opt::parse();

    let mut conf = match load_conf(&opt) {
        Ok(conf) => conf,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    conf.control.merge_with_opt(opt.control);
    if opt.signal.is_some() || opt.control_shell {
        return match run_client(&conf.control.control_socket, opt.signal.as_deref()) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(err) => {
                error!("{err}");
                ExitCode::FAILURE
            }
        };
    }

    conf.static_files.merge_with_opt(opt.static_files);
    conf.filter.merge_with_opt(opt.filter);
    conf.rate_limit.merge_with_opt(opt.rate_limit);
    conf.log.merge_with_opt(opt.log);

    if let Err(err) = absolute_paths(&mut conf) {
        error!("{err}");
        return ExitCode::FAILURE;
    }

    let static_files = match StaticFilesHandler::new(conf.static_files) {
        Ok(handler) => handler,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let filters = match FilterStore::load(conf.filter) {
        Ok(filters) => filters,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let log = LogWriter::new(&conf.log);
    let context = Arc::new(ServerContext::new(
        filters,
        ClientRateLimiter::new(conf.rate_limit.max_connections_per_minute),
        log.clone(),
    ));

    let control = match bind_control(&conf.control, context.command_table(), opt.startup.test) {
        Ok(control) => control,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let app = MiniwsApp::new(context, static_files);
    let mut server = conf.startup.into_server(app, Some(opt.startup));
    if let Some(control) = control {
        server.add_service(background_service("control channel", ControlService::from(control)));
    }
    server.add_service(background_service("log reopen", LogReopenService { log }));

    run(server);
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;
    use test_log::test;

    #[test]
    fn command_line() {
        Opt::command().debug_assert();

        let opt = Opt::try_parse_from([
            "miniws",
            "-p",
            "8080",
            "--root",
            "/srv/www",
            "--max-connections-per-minute",
            "120",
            "--max-log-bytes",
            "1024",
        ])
        .unwrap();
        assert_eq!(opt.startup.port, Some(8080));
        assert_eq!(opt.static_files.root, Some(PathBuf::from("/srv/www")));
        assert_eq!(opt.rate_limit.max_connections_per_minute, Some(120));
        assert_eq!(opt.log.max_log_bytes, Some(1024));
        assert!(opt.signal.is_none());

        let opt = Opt::try_parse_from(["miniws", "-s", "reload"]).unwrap();
        assert_eq!(opt.signal.as_deref(), Some("reload"));

        assert!(Opt::try_parse_from(["miniws", "-s", "reload", "--control-shell"]).is_err());
    }

    #[test]
    fn configuration() {
        let conf = Conf::from_yaml(
            [
                "listen: ['127.0.0.1:8080']",
                "threads: 2",
                "root: /srv/www",
                "config_dir: /etc/miniws",
                "max_connections_per_minute: 30",
                "log_dir: /var/log/miniws",
                "max_access_log_bytes: 4096",
                "control_socket: /run/miniws.sock",
            ]
            .join("\n"),
        )
        .unwrap();
        assert_eq!(conf.startup.listen_addrs(), vec!["127.0.0.1:8080".to_owned()]);
        assert_eq!(conf.startup.server.threads, 2);
        assert_eq!(conf.static_files.root, PathBuf::from("/srv/www"));
        assert_eq!(conf.static_files.index_file, vec!["index.html".to_owned()]);
        assert_eq!(conf.filter.config_dir, PathBuf::from("/etc/miniws"));
        assert_eq!(conf.rate_limit.max_connections_per_minute, 30);
        assert_eq!(conf.log.log_dir, PathBuf::from("/var/log/miniws"));
        assert_eq!(conf.log.access_log_threshold(), 4096);
        assert_eq!(conf.log.error_log_threshold(), 10 * 1024 * 1024);
        assert_eq!(
            conf.control.control_socket,
            PathBuf::from("/run/miniws.sock")
        );
    }

    #[test]
    fn paths_made_absolute() {
        let mut conf = Conf::from_yaml(
            [
                "config_dir: /etc/miniws",
                "log_dir: var/log",
                "control_socket: miniws.sock",
            ]
            .join("\n"),
        )
        .unwrap();
        absolute_paths(&mut conf).unwrap();

        let current_dir = std::env::current_dir().unwrap();
        assert_eq!(conf.filter.config_dir, PathBuf::from("/etc/miniws"));
        assert_eq!(conf.log.log_dir, current_dir.join("var/log"));
        assert_eq!(conf.control.control_socket, current_dir.join("miniws.sock"));

        let mut conf = Conf::default();
        absolute_paths(&mut conf).unwrap();
        assert!(conf.filter.config_dir.is_absolute());
        assert!(conf.filter.config_dir.ends_with("config"));
        assert!(conf.log.log_dir.is_absolute());
        assert!(conf.log.log_dir.ends_with("logs"));
        assert_eq!(
            conf.control.control_socket,
            PathBuf::from("/tmp/miniws_commands_server")
        );
    }

    #[test]
    fn control_skipped_in_test_mode() {
        let dir = tempfile::tempdir().unwrap();
        let conf = ControlConf {
            control_socket: dir.path().join("control.sock"),
        };

        let running = bind_control(&conf, CommandTable::new(), false)
            .unwrap()
            .unwrap();
        assert_eq!(running.path(), conf.control_socket);

        // Testing the configuration leaves the running server's socket alone
        assert!(bind_control(&conf, CommandTable::new(), true)
            .unwrap()
            .is_none());
        assert!(conf.control_socket.exists());

        assert!(bind_control(&conf, CommandTable::new(), false).is_err());
        assert!(conf.control_socket.exists());

        drop(running);
        assert!(!conf.control_socket.exists());
    }
}
