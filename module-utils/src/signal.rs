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

//! Unix signal processing

use log::{trace, warn};
use tokio::signal::unix::signal;

pub use tokio::signal::unix::SignalKind;

/// Calls `handler` whenever the process receives one of the given signals. Listening for a signal
/// stops once the handler returns `false` for it.
///
/// This needs to run within a Tokio runtime.
pub fn on_signals<F>(kinds: &[SignalKind], handler: F)
where
    F: Fn(SignalKind) -> bool + Clone + Send + 'static,
{
    for &kind in kinds {
        let handler = handler.clone();
        tokio::spawn(async move {
            let mut sig = match signal(kind) {
                Ok(sig) => sig,
                Err(err) => {
                    warn!(
                        "Failed registering for signal {}: {err}",
                        kind.as_raw_value()
                    );
                    return;
                }
            };

            while sig.recv().await.is_some() {
                trace!("signal {} received", kind.as_raw_value());
                if !handler(kind) {
                    break;
                }
            }
        });
    }
}
