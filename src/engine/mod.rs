pub mod breakpoint;
pub mod command;
pub mod error;
pub mod notify;

use crate::dbgp::response::{self, Init};
use crate::dbgp::{Command, DbgpTransport};
use crate::engine::breakpoint::BreakpointRegistry;
use crate::engine::error::Error;
use crate::engine::notify::StopNotifier;
use crate::mi::{Gdb, MiSession, ResultClass};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use strum_macros::{Display, EnumString, IntoStaticStr};

/// gdb breakpoint placed on the break location function, used to implement stepping.
pub const MASTER_BREAKPOINT: &str = "1";

/// Line of the break source reached before every new PHP line, the master breakpoint sits on it.
pub const STEP_LINE: u32 = 99;

/// Engine status as reported to the IDE.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    Starting,
    Stopping,
    Stopped,
    Running,
    Break,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Reason {
    Ok,
    Error,
    Aborted,
    Exception,
}

/// Engine status readable outside of the command loop, e.g. while a continue is blocked.
#[derive(Clone, Debug)]
pub struct StatusHandle(Arc<Mutex<Status>>);

impl StatusHandle {
    fn new(status: Status) -> Self {
        Self(Arc::new(Mutex::new(status)))
    }

    pub fn get(&self) -> Status {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn set(&self, status: Status) {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
    }
}

/// Value of a negotiable DBGp feature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureValue {
    pub value: String,
    pub read_only: bool,
}

fn default_features() -> IndexMap<String, FeatureValue> {
    [
        ("language_supports_threads", "0", true),
        ("language_name", "PHP", true),
        ("language_version", "7.0", true),
        ("encoding", "ISO-8859-1", true),
        ("protocol_version", "1", true),
        ("supports_async", "0", true),
        ("supports_reverse", "1", true),
        ("breakpoint_types", "line", true),
        ("multiple_sessions", "0", true),
        ("max_children", "64", false),
        ("max_data", "2048", false),
        ("max_depth", "1", false),
        ("extended_properties", "0", false),
        ("show_hidden", "0", false),
        ("notify_ok", "0", false),
    ]
    .into_iter()
    .map(|(name, value, read_only)| {
        (
            name.to_string(),
            FeatureValue {
                value: value.to_string(),
                read_only,
            },
        )
    })
    .collect()
}

/// Settings of a single debugging session.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Script the recording was started with.
    pub entry_file: String,
    pub idekey: String,
    /// Generated C source holding a line per PHP line, breakpoints are set in it.
    pub break_source: String,
    /// Script path to the first line of its block in the break source.
    pub source_map: HashMap<String, u32>,
    /// Ambient execution direction, commands may override it with `-z`.
    pub reverse: bool,
}

/// State of a debugging connection. Commands are handled one at a time.
pub struct Session<S: MiSession, T: DbgpTransport> {
    pub(crate) status: StatusHandle,
    pub(crate) reason: Reason,
    pub(crate) last_sequence_num: u32,
    pub(crate) features: IndexMap<String, FeatureValue>,
    pub(crate) breakpoints: BreakpointRegistry,
    pub(crate) max_stack_depth: i64,
    /// PHP stack level of each frame, recorded by the last stack depth request.
    pub(crate) level_ar: Vec<i64>,
    pub(crate) gdb: Gdb<S>,
    pub(crate) notifier: StopNotifier,
    pub(crate) options: SessionOptions,
    ide: T,
}

impl<S: MiSession, T: DbgpTransport> Session<S, T> {
    /// Create a session. `notifier` must be the one the gdb/mi listener delivers stops to.
    pub fn new(gdb: Gdb<S>, ide: T, notifier: StopNotifier, options: SessionOptions) -> Self {
        Self {
            status: StatusHandle::new(Status::Starting),
            reason: Reason::Ok,
            last_sequence_num: 0,
            features: default_features(),
            breakpoints: BreakpointRegistry::new(),
            max_stack_depth: 0,
            level_ar: vec![],
            gdb,
            notifier,
            options,
            ide,
        }
    }

    pub fn status(&self) -> Status {
        self.status.get()
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn last_sequence_num(&self) -> u32 {
        self.last_sequence_num
    }

    pub fn breakpoints(&self) -> &BreakpointRegistry {
        &self.breakpoints
    }

    /// Resume the recorded execution, forwards or backwards, and wait for it to stop.
    ///
    /// Return the id execution stopped on and true if the id belongs to a tracked breakpoint.
    /// A one-shot breakpoint is forgotten as soon as it's hit.
    pub fn continue_execution(&mut self, reverse: bool) -> Result<(String, bool), Error> {
        self.status.set(Status::Running);
        self.level_ar.clear();
        self.max_stack_depth = 0;

        // arm before resuming, the stop may arrive before gdb answers `^running`
        let waiter = self.notifier.arm();
        let args: &[&str] = if reverse { &["--reverse"] } else { &[] };
        let response = match self.gdb.send("exec-continue", args) {
            Ok(response) => response,
            Err(e) => {
                self.notifier.disarm();
                return Err(e);
            }
        };
        if !matches!(response.class, ResultClass::Running | ResultClass::Done) {
            self.notifier.disarm();
            let command = if reverse {
                "exec-continue --reverse"
            } else {
                "exec-continue"
            };
            return Err(Error::MiNotDone(command.to_string(), response.class));
        }

        let event = waiter.wait()?;
        self.status.set(Status::Break);

        if self.breakpoints.is_enabled_temporary(&event.id) {
            self.breakpoints.remove(&event.id);
            log::debug!(target: "engine", "one-shot breakpoint {} hit and removed", event.id);
            return Ok((event.id, true));
        }
        if self.breakpoints.is_enabled(&event.id) {
            return Ok((event.id, true));
        }
        Ok((event.id, false))
    }

    /// Handle a single parsed command and return the response payload.
    pub fn handle(&mut self, cmd: &Command) -> Result<String, Error> {
        use command::{is_forwarded, Breakpoints, Execution, Forward, Introspection};

        match cmd.name.as_str() {
            "status" | "feature_get" | "feature_set" | "stack_depth" => {
                Introspection::new(self).handle(cmd)
            }
            "breakpoint_set" | "breakpoint_get" | "breakpoint_list" | "breakpoint_update"
            | "breakpoint_remove" => Breakpoints::new(self).handle(cmd),
            "run" | "step_into" | "step_over" | "step_out" | "stop" | "detach" => {
                Execution::new(self).handle(cmd)
            }
            name if is_forwarded(name) => Forward::new(self).handle(cmd),
            name => Err(Error::UnimplementedCommand(name.to_string())),
        }
    }

    /// Parse and handle a raw command line. Recoverable failures become DBGp error responses.
    pub fn dispatch(&mut self, raw: &str) -> Result<String, Error> {
        let cmd = match Command::parse(raw, self.options.reverse) {
            Ok(cmd) => cmd,
            Err(e) => {
                let name = raw.split_whitespace().next().unwrap_or_default();
                return recover(name, 0, e);
            }
        };
        self.last_sequence_num = cmd.seq_num;
        self.handle(&cmd).or_else(|e| recover(&cmd.name, cmd.seq_num, e))
    }

    /// Introduce the engine to the IDE and serve its commands until the session ends.
    pub fn run(&mut self) -> Result<(), Error> {
        let fileuri = format!("file://{}", self.options.entry_file);
        let init = Init {
            fileuri: &fileuri,
            idekey: &self.options.idekey,
            appid: std::process::id(),
            language_version: self
                .features
                .get("language_version")
                .map(|f| f.value.as_str())
                .unwrap_or_default(),
        }
        .render();
        self.ide.write_packet(&init)?;

        while self.status.get() != Status::Stopped {
            let Some(raw) = self.ide.read_command()? else {
                log::info!(target: "engine", "ide closed the connection");
                break;
            };
            if raw.trim().is_empty() {
                continue;
            }

            let payload = self.dispatch(raw.trim())?;
            self.ide.write_packet(&payload)?;
        }

        self.notifier.close();
        Ok(())
    }
}

fn recover(command: &str, seq_num: u32, err: Error) -> Result<String, Error> {
    if err.is_fatal() {
        return Err(err);
    }
    log::warn!(target: "engine", "{command} failed: {err:#}");
    Ok(response::error(command, seq_num, &err))
}
