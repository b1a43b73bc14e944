use crate::dbgp::response::cdata;
use crate::dbgp::{Command, DbgpTransport, Response};
use crate::engine::error::Error;
use crate::engine::Session;
use crate::mi::MiSession;

/// Commands answered by the engine itself: `status`, `feature_get`, `feature_set`
/// and `stack_depth`.
pub struct Introspection<'a, S: MiSession, T: DbgpTransport> {
    session: &'a mut Session<S, T>,
}

impl<'a, S: MiSession, T: DbgpTransport> Introspection<'a, S, T> {
    pub fn new(session: &'a mut Session<S, T>) -> Self {
        Self { session }
    }

    pub fn handle(&mut self, cmd: &Command) -> Result<String, Error> {
        match cmd.name.as_str() {
            "status" => Ok(Response::new(&cmd.name, cmd.seq_num)
                .attr("status", self.session.status())
                .attr("reason", self.session.reason)
                .render()),
            "feature_get" => self.feature_get(cmd),
            "feature_set" => self.feature_set(cmd),
            "stack_depth" => self.stack_depth(cmd),
            name => Err(Error::UnimplementedCommand(name.to_string())),
        }
    }

    fn feature_get(&self, cmd: &Command) -> Result<String, Error> {
        let name = cmd.require('n')?;
        let response = Response::new(&cmd.name, cmd.seq_num).attr("feature_name", name);
        let response = match self.session.features.get(name) {
            Some(feature) => response
                .attr("supported", 1)
                .child(&cdata(&feature.value)),
            None => response.attr("supported", 0),
        };
        Ok(response.render())
    }

    fn feature_set(&mut self, cmd: &Command) -> Result<String, Error> {
        let name = cmd.require('n')?;
        let value = cmd.require('v')?;

        let success = match self.session.features.get_mut(name) {
            Some(feature) if !feature.read_only => {
                feature.value = value.to_string();
                true
            }
            _ => false,
        };
        if !success {
            log::warn!(target: "engine", "feature {name} can't be set to {value}");
        }

        Ok(Response::new(&cmd.name, cmd.seq_num)
            .attr("feature", name)
            .attr("success", u8::from(success))
            .render())
    }

    /// Depth of the PHP stack at the break location. Remembered to validate stack requests
    /// until execution moves again.
    fn stack_depth(&mut self, cmd: &Command) -> Result<String, Error> {
        let level = self.session.gdb.evaluate_int("level")?;
        let depth = level + 1;
        self.session.max_stack_depth = depth;
        self.session.level_ar = (0..=level).rev().collect();

        Ok(Response::new(&cmd.name, cmd.seq_num)
            .attr("depth", depth)
            .render())
    }
}
