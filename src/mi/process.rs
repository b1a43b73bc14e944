use crate::engine::error::Error;
use crate::engine::notify::{StopEvent, StopNotifier};
use crate::mi::output::{self, AsyncKind, Record, StreamKind};
use crate::mi::{MiResponse, MiSession, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

/// gdb running with the mi interpreter.
///
/// Output is consumed by a dedicated listener thread: result records are routed back
/// to [`GdbProcess::send`], `*stopped` records go to the stop notifier.
pub struct GdbProcess {
    child: Child,
    stdin: ChildStdin,
    results: Receiver<MiResponse>,
    next_token: u64,
}

impl GdbProcess {
    /// Start `gdb --interpreter=mi` with additional arguments.
    pub fn spawn(gdb: &Path, args: &[&str], notifier: StopNotifier) -> Result<Self, Error> {
        let mut child = Command::new(gdb)
            .arg("--interpreter=mi")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Path(gdb.to_path_buf(), e))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            _ = child.kill();
            return Err(Error::MiClosed);
        };

        let (tx, results) = mpsc::channel();
        thread::Builder::new()
            .name("gdb-mi-listener".to_string())
            .spawn(move || listen(stdout, tx, notifier))?;

        log::info!(target: "gdb", "gdb started, pid {}", child.id());

        Ok(Self {
            child,
            stdin,
            results,
            next_token: 1,
        })
    }
}

impl MiSession for GdbProcess {
    fn send(&mut self, command: &str, args: &[&str]) -> Result<MiResponse, Error> {
        let token = self.next_token;
        self.next_token += 1;

        let mut line = format!("{token}-{command}");
        for arg in args {
            line.push(' ');
            line.push_str(&quote_arg(arg));
        }
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(Error::MiTransport)?;

        loop {
            let response = self.results.recv().map_err(|_| Error::MiClosed)?;
            match response.token {
                Some(t) if t == token => return Ok(response),
                _ => {
                    log::debug!(target: "gdb", "result record of a stale command dropped: {response:?}");
                }
            }
        }
    }
}

impl Drop for GdbProcess {
    fn drop(&mut self) {
        _ = self.child.kill();
        _ = self.child.wait();
    }
}

/// Quote a command argument only if gdb would split or unescape it otherwise.
fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || matches!(c, '\\' | '"' | '\'')) {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn listen(stdout: ChildStdout, results: Sender<MiResponse>, notifier: StopNotifier) {
    for line in BufReader::new(stdout).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!(target: "gdb", "read gdb output: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let record = match output::parse_record(&line) {
            Ok(record) => record,
            Err(e) => {
                // the replayed program writes to the same terminal
                log::debug!(target: "gdb", "{e}");
                continue;
            }
        };

        match record {
            Record::Result {
                token,
                class,
                results: fields,
            } => {
                let response = MiResponse {
                    token,
                    class,
                    results: fields,
                };
                if results.send(response).is_err() {
                    break;
                }
            }
            Record::Async {
                kind: AsyncKind::Exec,
                class,
                results: fields,
                ..
            } if class == "stopped" => {
                let id = stop_id(&fields);
                log::debug!(target: "gdb", "stopped: {id}");
                notifier.notify(StopEvent::new(id));
            }
            Record::Async { kind, class, .. } => {
                log::debug!(target: "gdb", "async {kind:?} {class}");
            }
            Record::Stream { kind, text } => match kind {
                StreamKind::Log => log::debug!(target: "gdb", "{}", text.trim_end()),
                StreamKind::Console | StreamKind::Target => {
                    log::trace!(target: "gdb", "{}", text.trim_end())
                }
            },
            Record::Prompt => {}
        }
    }

    log::info!(target: "gdb", "gdb output closed");
    notifier.close();
}

/// Breakpoint number of a `*stopped` record, otherwise the stop reason (`exited-normally`, ...).
fn stop_id(fields: &[(String, Value)]) -> String {
    output::find(fields, "bkptno")
        .or_else(|| output::find(fields, "reason"))
        .and_then(Value::as_const)
        .unwrap_or("unknown")
        .to_string()
}
