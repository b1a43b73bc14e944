use crate::mi::ResultClass;
use std::num::ParseIntError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- generic errors --------------------------------------------
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("path {0}: {1}")]
    Path(PathBuf, std::io::Error),
    #[error("invalid configuration {0}: {1}")]
    Config(PathBuf, String),

    // --------------------------------- gdb/mi errors ---------------------------------------------
    #[error("gdb/mi transport: {0}")]
    MiTransport(std::io::Error),
    #[error("gdb/mi session closed")]
    MiClosed,
    #[error("malformed gdb/mi output `{0}`: {1}")]
    MiParse(String, String),
    #[error("not completed the gdb/mi command `{0}`: result class {1}")]
    MiNotDone(String, ResultClass),
    #[error("gdb/mi response to `{0}` has no `{1}` field")]
    MiMissingField(String, &'static str),
    #[error("improper gdb data-evaluate-expression string response: {0}")]
    StringResponse(String),
    #[error("integer evaluation of `{0}`: {1}")]
    IntResponse(String, ParseIntError),
    #[error("forwarding `{0}` to the replayed runtime: {1}")]
    Forward(String, Box<Error>),
    #[error("stop notification channel closed")]
    StopChannelClosed,
    #[error("replay: {0}")]
    Replay(String),

    // --------------------------------- dbgp protocol errors --------------------------------------
    #[error("empty dbgp command")]
    EmptyCommand,
    #[error("invalid sequence number `{0}`")]
    SeqNum(String),
    #[error("missing option -{0}")]
    MissingOption(char),
    #[error("invalid value `{1}` for option -{0}")]
    InvalidOption(char, String),
    #[error("invalid base64 data: {0}")]
    InvalidData(#[from] base64::DecodeError),
    #[error("unimplemented command {0}")]
    UnimplementedCommand(String),
    #[error("command {0} is not available while {1}")]
    CommandUnavailable(String, &'static str),
    #[error("stack depth {0} is out of range (max {1})")]
    StackDepth(i64, i64),

    // --------------------------------- breakpoint errors -----------------------------------------
    #[error("breakpoint {0} already registered")]
    DuplicateBreakpoint(String),
    #[error("breakpoint {0} not found")]
    BreakpointNotFound(String),
    #[error("breakpoint type `{0}` is not supported")]
    BreakpointType(String),
    #[error("no source mapping for {0}")]
    UnknownSource(String),
    #[error("gdb rejected breakpoint at {0}: {1}")]
    BreakpointRejected(String, String),

    // --------------------------------- environment errors ----------------------------------------
    #[error("could not find {0}: {1}")]
    ExecutableNotFound(String, which::Error),
    #[error("version not found in `{0}`")]
    VersionNotFound(String),
    #[error("only {tool} {required} supported, version {found} was given")]
    UnsupportedVersion {
        tool: &'static str,
        required: &'static str,
        found: String,
    },
}

impl Error {
    /// Return a hint to the command loop - answer the IDE with an error or stop the whole process.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::StringResponse(_) => false,
            Error::EmptyCommand => false,
            Error::SeqNum(_) => false,
            Error::MissingOption(_) => false,
            Error::InvalidOption(_, _) => false,
            Error::InvalidData(_) => false,
            Error::UnimplementedCommand(_) => false,
            Error::CommandUnavailable(_, _) => false,
            Error::StackDepth(_, _) => false,
            Error::DuplicateBreakpoint(_) => false,
            Error::BreakpointNotFound(_) => false,
            Error::BreakpointType(_) => false,
            Error::UnknownSource(_) => false,
            Error::BreakpointRejected(_, _) => false,

            // the bridge can't make progress without trusting gdb and its environment
            Error::IO(_) => true,
            Error::Path(_, _) => true,
            Error::Config(_, _) => true,
            Error::MiTransport(_) => true,
            Error::MiClosed => true,
            Error::MiParse(_, _) => true,
            Error::MiNotDone(_, _) => true,
            Error::MiMissingField(_, _) => true,
            Error::IntResponse(_, _) => true,
            Error::Forward(_, _) => true,
            Error::StopChannelClosed => true,
            Error::Replay(_) => true,
            Error::ExecutableNotFound(_, _) => true,
            Error::VersionNotFound(_) => true,
            Error::UnsupportedVersion { .. } => true,
        }
    }

    /// DBGp error code reported to the IDE for a recoverable error.
    pub fn dbgp_code(&self) -> u32 {
        match self {
            Error::EmptyCommand | Error::SeqNum(_) => 1,
            Error::MissingOption(_) | Error::InvalidOption(_, _) | Error::InvalidData(_) => 3,
            Error::UnimplementedCommand(_) => 4,
            Error::CommandUnavailable(_, _) => 5,
            Error::UnknownSource(_)
            | Error::BreakpointRejected(_, _)
            | Error::DuplicateBreakpoint(_) => 200,
            Error::BreakpointType(_) => 201,
            Error::BreakpointNotFound(_) => 205,
            Error::StringResponse(_) => 206,
            Error::StackDepth(_, _) => 301,
            _ => 999,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "engine", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "engine", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $res, $msg)
    };
}
