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

//! Shared state deciding whether requests are admitted

use control_channel_module::CommandTable;
use filter_module::FilterStore;
use http::StatusCode;
use log::{debug, info};
use rate_limit_module::ClientRateLimiter;
use rotating_log_module::LogWriter;
use std::sync::Arc;

/// Decision on an incoming request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Admitted,
    /// Rejected by the IP or User-Agent filter
    Forbidden,
    /// The client exceeded its request rate
    RateLimited,
}

impl Admission {
    /// Status code of the rejection response, `None` if the request may proceed.
    pub(crate) fn status(self) -> Option<StatusCode> {
        match self {
            Self::Admitted => None,
            Self::Forbidden => Some(StatusCode::FORBIDDEN),
            Self::RateLimited => Some(StatusCode::TOO_MANY_REQUESTS),
        }
    }
}

/// State shared between the HTTP application and the control channel
#[derive(Debug)]
pub(crate) struct ServerContext {
    filters: FilterStore,
    limiter: ClientRateLimiter,
    log: LogWriter,
}

impl ServerContext {
    pub(crate) fn new(filters: FilterStore, limiter: ClientRateLimiter, log: LogWriter) -> Self {
        Self {
            filters,
            limiter,
            log,
        }
    }

    pub(crate) fn log(&self) -> &LogWriter {
        &self.log
    }

    /// Checks a request against the filters and the client's rate limit.
    ///
    /// Requests rejected by the filters don't count against the rate limit. Missing values are
    /// matched as empty strings, so clients without an IP address share one rate limit.
    pub(crate) fn admit(&self, client_ip: Option<&str>, user_agent: Option<&str>) -> Admission {
        let client_ip = client_ip.unwrap_or_default();
        let user_agent = user_agent.unwrap_or_default();

        if !self.filters.is_allowed(client_ip, user_agent) {
            debug!("client {client_ip} with User-Agent {user_agent:?} rejected by filters");
            return Admission::Forbidden;
        }

        if !self.limiter.admit(client_ip) {
            debug!("client {client_ip} has been rate limited");
            return Admission::RateLimited;
        }

        Admission::Admitted
    }

    /// Reloads the filter files. On failure the previous filters stay active and the problem is
    /// written to the error log.
    pub(crate) fn reload(&self) -> bool {
        match self.filters.reload() {
            Ok(()) => {
                info!("filters reloaded");
                true
            }
            Err(err) => {
                self.log.log_error(format!("failed reloading filters: {err}"));
                false
            }
        }
    }

    /// Commands accepted over the control channel
    pub(crate) fn command_table(self: &Arc<Self>) -> CommandTable {
        let mut table = CommandTable::new();

        let context = self.clone();
        table.register("reload", move |_| context.reload());

        let log = self.log.clone();
        table.on_unknown(move |command| {
            log.log_error(format!(
                "unknown control command {} {:?}",
                command.name, command.arguments
            ));
        });

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use control_channel_module::client::send_command;
    use control_channel_module::{Command, ControlServer};
    use filter_module::FilterConf;
    use rotating_log_module::{LogConf, ERROR_LOG};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use test_log::test;
    use tokio::sync::watch;

    fn context(dir: &Path, rate: u32) -> Arc<ServerContext> {
        let filters = FilterStore::load(FilterConf {
            config_dir: dir.join("config"),
            ..Default::default()
        })
        .unwrap();
        let log = LogWriter::new(&LogConf {
            log_dir: dir.join("logs"),
            ..Default::default()
        });
        Arc::new(ServerContext::new(filters, ClientRateLimiter::new(rate), log))
    }

    fn error_log(dir: &Path) -> String {
        fs::read_to_string(dir.join("logs").join(ERROR_LOG)).unwrap_or_default()
    }

    #[test]
    fn admission() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join("ipfilter.conf"), "deny\n192.0.2.66\n").unwrap();
        fs::write(config_dir.join("useragentfilter.conf"), "deny\nBadBot\n").unwrap();

        let context = context(dir.path(), 1);
        assert_eq!(
            context.admit(Some("192.0.2.66"), Some("curl/8.0")),
            Admission::Forbidden
        );
        assert_eq!(
            context.admit(Some("192.0.2.1"), Some("Mozilla/5.0 BadBot/1.0")),
            Admission::Forbidden
        );

        // Rejected requests didn't use up the token
        assert_eq!(
            context.admit(Some("192.0.2.1"), Some("curl/8.0")),
            Admission::Admitted
        );
        assert_eq!(
            context.admit(Some("192.0.2.1"), Some("curl/8.0")),
            Admission::RateLimited
        );
        assert_eq!(context.admit(Some("192.0.2.2"), None), Admission::Admitted);

        assert_eq!(Admission::Admitted.status(), None);
        assert_eq!(Admission::Forbidden.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(
            Admission::RateLimited.status(),
            Some(StatusCode::TOO_MANY_REQUESTS)
        );
    }

    #[test(tokio::test)]
    async fn reload_command() {
        let dir = TempDir::new().unwrap();
        let context = context(dir.path(), 0);
        let table = context.command_table();
        assert_eq!(table.names(), vec!["reload"]);

        assert_eq!(
            context.admit(Some("192.0.2.1"), Some("curl/8.0")),
            Admission::Admitted
        );

        let ip_filter = dir.path().join("config/ipfilter.conf");
        fs::write(&ip_filter, "allow\n192.0.2.2\n").unwrap();
        assert!(table.dispatch(&Command::parse(b"reload").unwrap()));
        assert_eq!(
            context.admit(Some("192.0.2.1"), Some("curl/8.0")),
            Admission::Forbidden
        );
        assert_eq!(
            context.admit(Some("192.0.2.2"), Some("curl/8.0")),
            Admission::Admitted
        );

        fs::write(&ip_filter, "maybe\n").unwrap();
        assert!(!table.dispatch(&Command::parse(b"reload").unwrap()));
        assert_eq!(
            context.admit(Some("192.0.2.2"), Some("curl/8.0")),
            Admission::Admitted
        );

        context.log().flush().await;
        assert!(error_log(dir.path()).contains("failed reloading filters"));
    }

    #[test(tokio::test)]
    async fn unknown_command() {
        let dir = TempDir::new().unwrap();
        let context = context(dir.path(), 0);
        let table = context.command_table();

        assert!(!table.dispatch(&Command::parse(b"restart now please").unwrap()));

        context.log().flush().await;
        let log = error_log(dir.path());
        assert!(log.contains("unknown control command restart"));
        assert!(log.contains("\"now\", \"please\""));
    }

    #[test(tokio::test)]
    async fn control_round_trip() {
        let dir = TempDir::new().unwrap();
        let context = context(dir.path(), 0);
        let server =
            ControlServer::bind(dir.path().join("control.sock"), context.command_table()).unwrap();
        let path = server.path().to_owned();
        let (_shutdown_sender, shutdown) = watch::channel(false);
        tokio::spawn(server.serve(shutdown));

        let ip_filter = dir.path().join("config/ipfilter.conf");
        fs::write(ip_filter, "deny\n192.0.2.1  # misbehaving\n").unwrap();
        assert!(send_command(&path, "reload").await.unwrap());
        assert_eq!(context.admit(Some("192.0.2.1"), None), Admission::Forbidden);

        let snapshot = context.filters.snapshot();
        assert!(!send_command(&path, "frobnicate").await.unwrap());
        assert!(Arc::ptr_eq(&snapshot, &context.filters.snapshot()));
    }
}
