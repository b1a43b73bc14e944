use crate::dbgp::response::strip_declaration;
use crate::dbgp::{Command, DbgpTransport};
use crate::engine::error::Error;
use crate::engine::{Session, Status};
use crate::mi::MiSession;

/// Commands executed by the debugger extension inside the replayed runtime.
const FORWARDED: &[&str] = &[
    "stack_get",
    "context_names",
    "context_get",
    "property_get",
    "property_value",
    "typemap_get",
    "eval",
    "source",
];

/// Function of the replayed runtime that runs a DBGp command and returns the response xml.
const XDEBUG_CMD_FN: &str = "dontbug_xdebug_cmd";

pub fn is_forwarded(name: &str) -> bool {
    FORWARDED.contains(&name)
}

/// Hand a command over to the replayed runtime and relay its answer.
pub struct Forward<'a, S: MiSession, T: DbgpTransport> {
    session: &'a mut Session<S, T>,
}

impl<'a, S: MiSession, T: DbgpTransport> Forward<'a, S, T> {
    pub fn new(session: &'a mut Session<S, T>) -> Self {
        Self { session }
    }

    pub fn handle(&mut self, cmd: &Command) -> Result<String, Error> {
        let status = self.session.status();
        if status != Status::Break {
            return Err(Error::CommandUnavailable(
                cmd.name.clone(),
                status.into(),
            ));
        }
        if cmd.name == "stack_get" {
            if let Some(depth) = cmd.parsed::<i64>('d')? {
                self.check_depth(depth)?;
            }
        }

        let expression = format!("{XDEBUG_CMD_FN}(\"{}\")", escape_c(&cmd.full_command));
        let xml = self
            .session
            .gdb
            .evaluate_string(&expression)
            .map_err(|e| Error::Forward(cmd.full_command.clone(), Box::new(e)))?;
        Ok(strip_declaration(&xml).to_string())
    }

    /// Depth is checked against the last `stack_depth` answer, if the IDE asked for it.
    fn check_depth(&self, depth: i64) -> Result<(), Error> {
        let known = !self.session.level_ar.is_empty();
        if depth < 0 || (known && depth >= self.session.max_stack_depth) {
            return Err(Error::StackDepth(depth, self.session.max_stack_depth));
        }
        Ok(())
    }
}

/// Escape text for a C string literal.
fn escape_c(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
