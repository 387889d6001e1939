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

use log::{debug, trace};
use module_utils::pingora::Error;
use module_utils::PROTOCOL_ERROR;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

/// Maximal size of a single command frame in bytes
pub const MAX_FRAME_SIZE: usize = 4096;

/// A command received over the control channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command name, the frame contents up to the first space
    pub name: String,
    /// Whitespace-separated arguments following the name
    pub arguments: Vec<String>,
}

impl Command {
    /// Parses a command frame.
    ///
    /// NUL bytes and surrounding whitespace are ignored. Frames that aren't valid UTF-8 or don't
    /// contain anything result in an error of type [`PROTOCOL_ERROR`].
    pub fn parse(frame: &[u8]) -> Result<Self, Box<Error>> {
        let frame = std::str::from_utf8(frame)
            .map_err(|err| Error::because(PROTOCOL_ERROR, "command is not valid UTF-8", err))?;
        let frame = frame.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if frame.is_empty() {
            return Err(Error::explain(PROTOCOL_ERROR, "empty command"));
        }

        let (name, arguments) = frame.split_once(' ').unwrap_or((frame, ""));
        Ok(Self {
            name: name.to_owned(),
            arguments: arguments.split_whitespace().map(str::to_owned).collect(),
        })
    }
}

type Handler = Box<dyn Fn(&[String]) -> bool + Send + Sync>;
type UnknownReporter = Box<dyn Fn(&Command) + Send + Sync>;

/// Maps command names to their handlers
///
/// A handler receives the command arguments and returns `true` if the command was applied.
#[derive(Default)]
pub struct CommandTable {
    handlers: HashMap<String, Handler>,
    unknown: Option<UnknownReporter>,
}

impl Debug for CommandTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_struct("CommandTable")
            .field("handlers", &names)
            .field("unknown", &self.unknown.is_some())
            .finish()
    }
}

impl CommandTable {
    /// Creates an empty command table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command handler, replacing any handler registered for the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        trace!("registering control command {name}");
        self.handlers.insert(name, Box::new(handler));
    }

    /// Sets a function to be called for commands without a handler.
    pub fn on_unknown<F>(&mut self, reporter: F)
    where
        F: Fn(&Command) + Send + Sync + 'static,
    {
        self.unknown = Some(Box::new(reporter));
    }

    /// Names of all registered commands
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Runs the handler for a command. Returns `false` for unknown commands.
    pub fn dispatch(&self, command: &Command) -> bool {
        if let Some(handler) = self.handlers.get(&command.name) {
            let applied = handler(&command.arguments);
            debug!(
                "control command {} {}",
                command.name,
                if applied { "applied" } else { "rejected" }
            );
            applied
        } else {
            debug!("unknown control command {}", command.name);
            if let Some(unknown) = &self.unknown {
                unknown(command);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};
    use test_log::test;

    #[test]
    fn parsing() {
        assert_eq!(
            Command::parse(b"reload").unwrap(),
            Command {
                name: "reload".to_owned(),
                arguments: Vec::new(),
            }
        );

        let mut frame = b"  ban 192.0.2.1   10\tminutes \n".to_vec();
        frame.resize(64, 0);
        assert_eq!(
            Command::parse(&frame).unwrap(),
            Command {
                name: "ban".to_owned(),
                arguments: vec![
                    "192.0.2.1".to_owned(),
                    "10".to_owned(),
                    "minutes".to_owned()
                ],
            }
        );
    }

    #[test]
    fn malformed_frames() {
        let frames: [&[u8]; 4] = [b"", b"\0\0\0", b" \n ", b"reload\xff"];
        for frame in frames {
            let err = Command::parse(frame).unwrap_err();
            assert_eq!(err.etype, PROTOCOL_ERROR);
        }
    }

    #[test]
    fn dispatching() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let unknown = Arc::new(Mutex::new(Vec::new()));

        let mut table = CommandTable::new();
        {
            let received = received.clone();
            table.register("echo", move |args| {
                received.lock().unwrap().push(args.to_vec());
                !args.is_empty()
            });
        }
        {
            let unknown = unknown.clone();
            table.on_unknown(move |command| unknown.lock().unwrap().push(command.clone()));
        }
        assert_eq!(table.names(), vec!["echo"]);

        assert!(table.dispatch(&Command::parse(b"echo a b").unwrap()));
        assert!(!table.dispatch(&Command::parse(b"echo").unwrap()));
        assert!(!table.dispatch(&Command::parse(b"frobnicate x").unwrap()));

        assert_eq!(
            *received.lock().unwrap(),
            vec![vec!["a".to_owned(), "b".to_owned()], Vec::new()]
        );
        assert_eq!(
            *unknown.lock().unwrap(),
            vec![Command {
                name: "frobnicate".to_owned(),
                arguments: vec!["x".to_owned()],
            }]
        );
    }

    #[test]
    fn without_reporter() {
        let table = CommandTable::new();
        assert!(!table.dispatch(&Command::parse(b"reload").unwrap()));
        assert_eq!(
            format!("{table:?}"),
            "CommandTable { handlers: [], unknown: false }"
        );
    }
}
