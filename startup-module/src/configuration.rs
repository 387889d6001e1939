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

use clap::Args;
use log::info;
use module_utils::pingora::{http_proxy_service, ProxyHttp, Server, ServerConf, ServerOpt};
use serde::Deserialize;
use std::path::PathBuf;

/// Port the server listens on if nothing else is configured
pub const DEFAULT_PORT: u16 = 8040;

/// Run a web server
#[derive(Debug, Default, Args)]
pub struct StartupOpt {
    /// Address and port to listen on, e.g. "127.0.0.1:8080". This command line flag can be
    /// specified multiple times.
    #[arg(short, long)]
    pub listen: Option<Vec<String>>,
    /// Port to listen on, on all IPv4 interfaces. Ignored if --listen is present.
    #[arg(short, long)]
    pub port: Option<u16>,
    /// Use this flag to make the server run in the background.
    #[arg(short, long)]
    pub daemon: bool,
    /// Test the configuration and exit. This is useful to validate the configuration before
    /// restarting the process.
    #[arg(short, long)]
    pub test: bool,
    /// The path to the configuration file.
    #[arg(short, long)]
    pub conf: Option<PathBuf>,
}

/// Configuration settings of the startup module
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartupConf {
    /// List of address/port combinations to listen on, e.g. "127.0.0.1:8080".
    pub listen: Vec<String>,
    /// Pingora’s default server configuration options
    #[serde(flatten)]
    pub server: ServerConf,
}

impl StartupConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    ///
    /// The `daemon` flag is merged into the server configuration. `test` and `conf` flags aren’t
    /// configuration settings and are ignored here.
    pub fn merge_with_opt(&mut self, opt: &StartupOpt) {
        if let Some(listen) = &opt.listen {
            self.listen = listen.clone();
        } else if let Some(port) = opt.port {
            self.listen = vec![format!("0.0.0.0:{port}")];
        }

        if opt.daemon {
            self.server.daemon = true;
        }
    }

    /// Addresses the server will listen on
    pub fn listen_addrs(&self) -> Vec<String> {
        if self.listen.is_empty() {
            vec![format!("0.0.0.0:{DEFAULT_PORT}")]
        } else {
            self.listen.clone()
        }
    }

    /// Sets up a server with the given configuration and command line options
    pub fn into_server<SV>(mut self, app: SV, opt: Option<StartupOpt>) -> Server
    where
        SV: ProxyHttp + Send + Sync + 'static,
        <SV as ProxyHttp>::CTX: Send + Sync,
    {
        let opt = opt.unwrap_or_default();
        self.merge_with_opt(&opt);
        let listen = self.listen_addrs();

        let mut server = Server::new_with_opt_and_conf(
            ServerOpt {
                daemon: self.server.daemon,
                test: opt.test,
                upgrade: false,
                nocapture: false,
                conf: None,
            },
            self.server,
        );
        server.bootstrap();

        let mut proxy = http_proxy_service(&server.configuration, app);
        for addr in listen {
            info!("listening on {addr}");
            proxy.add_tcp(&addr);
        }
        server.add_service(proxy);

        server
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use module_utils::FromYaml;
    use test_log::test;

    #[test]
    fn default_listen() {
        let conf = StartupConf::from_yaml("{}").unwrap();
        assert_eq!(conf.listen_addrs(), vec!["0.0.0.0:8040".to_owned()]);
    }

    #[test]
    fn configured_listen() {
        let mut conf =
            StartupConf::from_yaml("listen: ['127.0.0.1:8080', '[::1]:8080']\nthreads: 4")
                .unwrap();
        assert_eq!(
            conf.listen_addrs(),
            vec!["127.0.0.1:8080".to_owned(), "[::1]:8080".to_owned()]
        );
        assert_eq!(conf.server.threads, 4);

        conf.merge_with_opt(&StartupOpt {
            port: Some(9000),
            ..Default::default()
        });
        assert_eq!(conf.listen_addrs(), vec!["0.0.0.0:9000".to_owned()]);

        conf.merge_with_opt(&StartupOpt {
            listen: Some(vec!["127.0.0.1:1234".to_owned()]),
            port: Some(9001),
            daemon: true,
            ..Default::default()
        });
        assert_eq!(conf.listen_addrs(), vec!["127.0.0.1:1234".to_owned()]);
        assert!(conf.server.daemon);
    }
}
