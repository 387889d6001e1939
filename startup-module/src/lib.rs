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

//! # Startup Module for miniws
//!
//! This crate handles the command line flags and configuration settings determining where the
//! server listens, and creates a Pingora server from them. Other modules only provide the app:
//!
//! ```rust,no_run
//! use module_utils::FromYaml;
//! use startup_module::StartupConf;
//! # use module_utils::pingora::{Error, ErrorType, HttpPeer, ProxyHttp, Session};
//! # #[derive(Debug)]
//! # struct App;
//! # #[async_trait::async_trait]
//! # impl ProxyHttp for App {
//! #     type CTX = ();
//! #     fn new_ctx(&self) {}
//! #     async fn upstream_peer(
//! #         &self,
//! #         _session: &mut Session,
//! #         _ctx: &mut (),
//! #     ) -> Result<Box<HttpPeer>, Box<Error>> {
//! #         Err(Error::new(ErrorType::HTTPStatus(404)))
//! #     }
//! # }
//!
//! let conf = StartupConf::from_yaml("listen: ['127.0.0.1:8040']").unwrap();
//! let server = conf.into_server(App, None);
//! server.run_forever();
//! ```
//!
//! Without any configuration the server listens on port 8040 of all IPv4 interfaces. The
//! `--port` command line flag is a shortcut for `--listen 0.0.0.0:<port>`.

mod configuration;

pub use configuration::{StartupConf, StartupOpt, DEFAULT_PORT};
