use crate::dbgp::response::escape;
use crate::dbgp::{Command, DbgpTransport, Response};
use crate::engine::error::Error;
use crate::engine::{Reason, Session, Status, MASTER_BREAKPOINT};
use crate::mi::{Evaluation, Expect, MiSession};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Step {
    Into,
    Over,
    Out,
}

/// `run`, `step_*`, `stop` and `detach` commands. Any of the movements runs backwards
/// when the command is reversed.
pub struct Execution<'a, S: MiSession, T: DbgpTransport> {
    session: &'a mut Session<S, T>,
}

impl<'a, S: MiSession, T: DbgpTransport> Execution<'a, S, T> {
    pub fn new(session: &'a mut Session<S, T>) -> Self {
        Self { session }
    }

    pub fn handle(&mut self, cmd: &Command) -> Result<String, Error> {
        match cmd.name.as_str() {
            "run" => self.run(cmd),
            "step_into" => self.step(cmd, Step::Into),
            "step_over" => self.step(cmd, Step::Over),
            "step_out" => self.step(cmd, Step::Out),
            "stop" | "detach" => self.stop(cmd),
            name => Err(Error::UnimplementedCommand(name.to_string())),
        }
    }

    /// Forward execution is impossible past the end of the recording, backwards is fine.
    fn ensure_movable(&self, cmd: &Command) -> Result<(), Error> {
        match self.session.status() {
            Status::Stopping if !cmd.reverse => {
                Err(Error::CommandUnavailable(cmd.name.clone(), "stopping"))
            }
            Status::Stopped => Err(Error::CommandUnavailable(cmd.name.clone(), "stopped")),
            _ => Ok(()),
        }
    }

    fn run(&mut self, cmd: &Command) -> Result<String, Error> {
        self.ensure_movable(cmd)?;

        let (id, hit) = self.session.continue_execution(cmd.reverse)?;
        log::info!(
            target: "engine",
            "{} stopped at {id}{}",
            if cmd.reverse { "reverse run" } else { "run" },
            if hit { " (breakpoint)" } else { "" }
        );
        self.break_response(cmd, &id)
    }

    /// Steps stop at the master breakpoint, whose condition selects the PHP stack levels
    /// the step may stop at.
    fn step(&mut self, cmd: &Command, step: Step) -> Result<String, Error> {
        self.ensure_movable(cmd)?;

        let gdb = &mut self.session.gdb;
        let level = match step {
            Step::Into => None,
            Step::Over | Step::Out => match gdb.evaluate("level", Expect::Int)? {
                Evaluation::Int(level) => Some(level),
                // not in a PHP frame yet (or anymore), any next line will do
                _ => {
                    log::debug!(target: "engine", "no PHP stack level, {step:?} stops at the next line");
                    None
                }
            },
        };
        let condition = level.map(|level| match step {
            Step::Out => format!("level < {level}"),
            _ => format!("level <= {level}"),
        });

        if let Some(condition) = &condition {
            gdb.send("break-condition", &[MASTER_BREAKPOINT, condition.as_str()])?
                .expect_done("break-condition")?;
        }
        gdb.send("break-enable", &[MASTER_BREAKPOINT])?
            .expect_done("break-enable")?;

        let (id, _) = self.session.continue_execution(cmd.reverse)?;

        let gdb = &mut self.session.gdb;
        gdb.send("break-disable", &[MASTER_BREAKPOINT])?
            .expect_done("break-disable")?;
        if condition.is_some() {
            gdb.send("break-condition", &[MASTER_BREAKPOINT])?
                .expect_done("break-condition")?;
        }

        let direction = if cmd.reverse { "reverse" } else { "forward" };
        log::debug!(target: "engine", "{direction} step {step:?} stopped at {id}");
        self.break_response(cmd, &id)
    }

    fn stop(&mut self, cmd: &Command) -> Result<String, Error> {
        self.session.status.set(Status::Stopped);
        self.session.reason = Reason::Ok;
        log::info!(target: "engine", "{} requested, closing the session", cmd.name);

        Ok(Response::new(&cmd.name, cmd.seq_num)
            .attr("status", self.session.status())
            .attr("reason", self.session.reason)
            .render())
    }

    fn break_response(&mut self, cmd: &Command, id: &str) -> Result<String, Error> {
        if id.starts_with("exited") {
            self.session.status.set(Status::Stopping);
        }

        let mut response = Response::new(&cmd.name, cmd.seq_num)
            .attr("status", self.session.status())
            .attr("reason", self.session.reason);
        if self.session.status() == Status::Break {
            if let Some(message) = self.location_message()? {
                response = response.child(&message);
            }
        }
        Ok(response.render())
    }

    /// Script position reported by the break location frame, if execution stopped in it.
    fn location_message(&mut self) -> Result<Option<String>, Error> {
        let gdb = &mut self.session.gdb;
        let filename = match gdb.evaluate("filename", Expect::Str) {
            Ok(Evaluation::Str(filename)) => filename,
            Ok(_) | Err(Error::StringResponse(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let lineno = match gdb.evaluate("lineno", Expect::Int)? {
            Evaluation::Int(lineno) => lineno,
            _ => return Ok(None),
        };
        Ok(Some(format!(
            r#"<xdebug:message filename="file://{}" lineno="{lineno}"></xdebug:message>"#,
            escape(&filename)
        )))
    }
}
