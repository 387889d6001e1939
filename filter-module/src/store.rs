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

use log::{debug, info};
use module_utils::pingora::Error;
use std::sync::{Arc, PoisonError, RwLock};

use crate::configuration::FilterConf;
use crate::list::{FilterList, MatchKind};

/// The IP and User-Agent lists, replaced together on reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    /// List matched exactly against the client's IP address
    pub ip: FilterList,
    /// List matched as substrings of the `User-Agent` header
    pub user_agent: FilterList,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            ip: FilterList::empty(MatchKind::Exact),
            user_agent: FilterList::empty(MatchKind::Substring),
        }
    }
}

impl Filters {
    /// Loads both filter files. Either failing produces an error.
    pub fn load(conf: &FilterConf) -> Result<Self, Box<Error>> {
        let ip = FilterList::load(&conf.ip_filter_path(), MatchKind::Exact)?;
        let user_agent =
            FilterList::load(&conf.user_agent_filter_path(), MatchKind::Substring)?;
        debug!(
            "loaded {} IP and {} User-Agent patterns",
            ip.patterns().len(),
            user_agent.patterns().len()
        );
        Ok(Self { ip, user_agent })
    }

    /// Checks whether a request passes both lists. A missing User-Agent header should be passed
    /// in as an empty string.
    pub fn is_allowed(&self, ip: &str, user_agent: &str) -> bool {
        self.ip.is_allowed(ip) && self.user_agent.is_allowed(user_agent)
    }
}

/// Holds the active [`Filters`] and replaces them on reload
#[derive(Debug)]
pub struct FilterStore {
    conf: FilterConf,
    active: RwLock<Arc<Filters>>,
}

impl FilterStore {
    /// Creates a store with the filters loaded from the configured files. Errors are returned to
    /// the caller, the server shouldn't start without its filters.
    pub fn load(conf: FilterConf) -> Result<Self, Box<Error>> {
        let filters = Filters::load(&conf)?;
        Ok(Self {
            conf,
            active: RwLock::new(Arc::new(filters)),
        })
    }

    /// Returns the currently active filters. The snapshot stays valid regardless of later
    /// reloads.
    pub fn snapshot(&self) -> Arc<Filters> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Checks a request against the active filters.
    pub fn is_allowed(&self, ip: &str, user_agent: &str) -> bool {
        self.snapshot().is_allowed(ip, user_agent)
    }

    /// Reads the filter files again. The active filters are replaced only if both files loaded
    /// successfully, otherwise the error is returned and the previous filters stay active.
    pub fn reload(&self) -> Result<(), Box<Error>> {
        let filters = Filters::load(&self.conf)?;
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(filters);
        info!("filter lists reloaded");
        Ok(())
    }
}
