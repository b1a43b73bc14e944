//! gdb machine interface: output records, the session seam and the typed adapter.

mod adapter;
pub mod output;
mod process;

pub use adapter::{unquote, Evaluation, Expect, Gdb, Verbosity};
pub use output::{parse_record, AsyncKind, Record, StreamKind, Value};
pub use process::GdbProcess;

use crate::engine::error::Error;
use strum_macros::{Display, EnumString};

/// Class of a gdb/mi result record (`^done`, `^running`, ...).
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString, Display)]
pub enum ResultClass {
    #[strum(serialize = "done")]
    Done,
    #[strum(serialize = "running")]
    Running,
    #[strum(serialize = "connected")]
    Connected,
    #[strum(serialize = "error")]
    Error,
    #[strum(serialize = "exit")]
    Exit,
}

/// Result record answering a single gdb/mi command.
#[derive(Clone, Debug, PartialEq)]
pub struct MiResponse {
    pub token: Option<u64>,
    pub class: ResultClass,
    pub results: Vec<(String, Value)>,
}

impl MiResponse {
    pub fn new(class: ResultClass, results: Vec<(String, Value)>) -> Self {
        Self {
            token: None,
            class,
            results,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        output::find(&self.results, name)
    }

    /// Fail unless gdb completed the command.
    pub fn expect_done(self, command: &str) -> Result<Self, Error> {
        if self.class == ResultClass::Done {
            Ok(self)
        } else {
            Err(Error::MiNotDone(command.to_string(), self.class))
        }
    }

    /// Error message of an `^error` record.
    pub fn error_message(&self) -> Option<&str> {
        self.get("msg").and_then(Value::as_const)
    }
}

/// Channel to a running gdb/mi interpreter.
pub trait MiSession {
    /// Send a command (without the leading `-`) and wait for its result record.
    fn send(&mut self, command: &str, args: &[&str]) -> Result<MiResponse, Error>;
}

impl<S: MiSession + ?Sized> MiSession for Box<S> {
    fn send(&mut self, command: &str, args: &[&str]) -> Result<MiResponse, Error> {
        (**self).send(command, args)
    }
}
