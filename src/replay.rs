//! rr replay server and the gdb session attached to it.

use crate::engine::error::Error;
use crate::engine::{MASTER_BREAKPOINT, STEP_LINE};
use crate::mi::{Gdb, MiSession, Value};
use once_cell::sync;
use regex::Regex;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;

/// Where gdb finds the replay, as announced by rr.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Launch {
    /// Address of the gdb server, `host:port`.
    pub address: String,
    /// Executable of the replayed process.
    pub executable: Option<String>,
}

impl Launch {
    /// Parse the launch hint from lines like
    /// `gdb '-l' '10000' '-ex' 'target extended-remote 127.0.0.1:9999' /home/u/.local/share/rr/php-0/mmap_hardlink_3_php`.
    pub fn parse(line: &str) -> Option<Self> {
        static LAUNCH_RE: sync::Lazy<Regex> = sync::Lazy::new(|| {
            Regex::new(r"target extended-remote ([^'\s]+)'?(?:\s+'?([^'\s]+)'?)?")
                .expect("must compile")
        });

        let captures = LAUNCH_RE.captures(line)?;
        Some(Launch {
            address: captures[1].to_string(),
            executable: captures.get(2).map(|m| m.as_str().to_string()),
        })
    }
}

/// Running `rr replay` acting as a gdb server. Killed on drop.
pub struct Replay {
    child: Child,
    launch: Launch,
}

impl Replay {
    /// Start replaying a trace and wait until rr is ready to accept gdb.
    pub fn start(rr: &Path, trace_dir: &Path, port: u16) -> Result<Self, Error> {
        let mut child = Command::new(rr)
            .arg("replay")
            .arg(format!("--dbgport={port}"))
            .arg(trace_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Path(rr.to_path_buf(), e))?;
        log::info!(target: "replay", "rr replay of {} started, pid {}", trace_dir.display(), child.id());

        let Some(stdout) = child.stdout.take() else {
            _ = child.kill();
            return Err(Error::Replay("rr stdout is not captured".to_string()));
        };
        let mut reader = BufReader::new(stdout);

        let mut line = String::new();
        let launch = loop {
            line.clear();
            let read = match reader.read_line(&mut line) {
                Ok(read) => read,
                Err(e) => {
                    _ = child.kill();
                    return Err(Error::IO(e));
                }
            };
            if read == 0 {
                _ = child.kill();
                return Err(Error::Replay(
                    "rr exited before announcing the gdb server".to_string(),
                ));
            }
            log::debug!(target: "replay", "{}", line.trim_end());
            if let Some(launch) = Launch::parse(&line) {
                break launch;
            }
        };
        log::info!(target: "replay", "rr gdb server at {}", launch.address);

        thread::Builder::new()
            .name("rr-output".to_string())
            .spawn(move || drain(reader))?;

        Ok(Self { child, launch })
    }

    pub fn launch(&self) -> &Launch {
        &self.launch
    }
}

impl Drop for Replay {
    fn drop(&mut self) {
        _ = self.child.kill();
        _ = self.child.wait();
        log::debug!(target: "replay", "rr replay stopped");
    }
}

/// Output of the replayed program.
fn drain(reader: BufReader<ChildStdout>) {
    for line in reader.lines() {
        match line {
            Ok(line) => log::debug!(target: "replay", "{line}"),
            Err(_) => break,
        }
    }
}

/// Connect gdb to the replay and place the (disabled) master breakpoint used for stepping
/// on the step line of `break_source`.
pub fn attach<S: MiSession>(
    gdb: &mut Gdb<S>,
    launch: &Launch,
    break_source: &str,
) -> Result<(), Error> {
    gdb.send("gdb-set", &["sysroot", "/"])?
        .expect_done("gdb-set sysroot")?;
    if let Some(executable) = &launch.executable {
        gdb.send("file-exec-and-symbols", &[executable.as_str()])?
            .expect_done("file-exec-and-symbols")?;
    }
    gdb.send_noisy("target-select", &["extended-remote", launch.address.as_str()])?
        .expect_done("target-select")?;

    // pending until the runtime extension is loaded
    let location = format!("{break_source}:{STEP_LINE}");
    let response = gdb
        .send_noisy("break-insert", &["-f", "-d", location.as_str()])?
        .expect_done("break-insert")?;
    let number = response
        .get("bkpt")
        .and_then(|bkpt| bkpt.get("number"))
        .and_then(Value::as_const)
        .ok_or_else(|| Error::MiMissingField("break-insert".to_string(), "number"))?;
    if number != MASTER_BREAKPOINT {
        return Err(Error::Replay(format!(
            "master breakpoint got number {number}, {MASTER_BREAKPOINT} expected"
        )));
    }
    Ok(())
}
