use crate::dbgp::response::escape;
use crate::dbgp::{Command, DbgpTransport, Response};
use crate::engine::breakpoint::{Breakpoint, BreakpointKind, BreakpointState};
use crate::engine::error::Error;
use crate::engine::Session;
use crate::mi::{MiSession, ResultClass, Value};
use std::str::FromStr;

/// `breakpoint_*` commands. Every DBGp breakpoint is backed by a gdb breakpoint
/// inside the break source, its gdb number is the DBGp id.
pub struct Breakpoints<'a, S: MiSession, T: DbgpTransport> {
    session: &'a mut Session<S, T>,
}

impl<'a, S: MiSession, T: DbgpTransport> Breakpoints<'a, S, T> {
    pub fn new(session: &'a mut Session<S, T>) -> Self {
        Self { session }
    }

    pub fn handle(&mut self, cmd: &Command) -> Result<String, Error> {
        match cmd.name.as_str() {
            "breakpoint_set" => self.set(cmd),
            "breakpoint_get" => self.get(cmd),
            "breakpoint_list" => self.list(cmd),
            "breakpoint_update" => self.update(cmd),
            "breakpoint_remove" => self.remove(cmd),
            name => Err(Error::UnimplementedCommand(name.to_string())),
        }
    }

    fn set(&mut self, cmd: &Command) -> Result<String, Error> {
        let r#type = cmd.require('t')?;
        let kind = BreakpointKind::from_str(r#type)
            .map_err(|_| Error::InvalidOption('t', r#type.to_string()))?;
        if kind != BreakpointKind::Line {
            return Err(Error::BreakpointType(r#type.to_string()));
        }

        let file = cmd.require('f')?;
        let filename = file.strip_prefix("file://").unwrap_or(file);
        let lineno: u32 = cmd.parsed('n')?.ok_or(Error::MissingOption('n'))?;
        let state = cmd.parsed('s')?.unwrap_or(BreakpointState::Enabled);
        let temporary = match cmd.option('r') {
            None | Some("0") => false,
            Some("1") => true,
            Some(other) => return Err(Error::InvalidOption('r', other.to_string())),
        };
        let hit_value: Option<u32> = cmd.parsed('h')?;
        let hit_condition = cmd.option('o').map(ToString::to_string);
        let ignore = ignore_count(hit_value, hit_condition.as_deref())?;

        let base = *self
            .session
            .options
            .source_map
            .get(filename)
            .ok_or_else(|| Error::UnknownSource(filename.to_string()))?;
        let location = break_location(&self.session.options.break_source, base, lineno)?;

        let ignore = ignore.map(|count| count.to_string());
        // the runtime extension is loaded later in the replay, gdb has to accept a pending location
        let mut args = vec!["-f"];
        if temporary {
            args.push("-t");
        }
        if state == BreakpointState::Disabled {
            args.push("-d");
        }
        if let Some(count) = ignore.as_deref() {
            args.extend(["-i", count]);
        }
        args.push(location.as_str());

        let response = self.session.gdb.send_noisy("break-insert", &args)?;
        if response.class != ResultClass::Done {
            let reason = response.error_message().unwrap_or_default().to_string();
            return Err(Error::BreakpointRejected(location, reason));
        }
        let id = response
            .get("bkpt")
            .and_then(|bkpt| bkpt.get("number"))
            .and_then(Value::as_const)
            .ok_or_else(|| Error::MiMissingField("break-insert".to_string(), "number"))?
            .to_string();

        log::info!(target: "engine", "breakpoint {id} set at {filename}:{lineno} ({location})");

        let brkpt = self.session.breakpoints.insert(Breakpoint {
            id,
            kind,
            state,
            temporary,
            filename: filename.to_string(),
            lineno,
            location,
            hit_value,
            hit_condition,
        })?;

        Ok(Response::new(&cmd.name, cmd.seq_num)
            .attr("state", brkpt.state)
            .attr("id", &brkpt.id)
            .render())
    }

    fn get(&self, cmd: &Command) -> Result<String, Error> {
        let id = cmd.require('d')?;
        let brkpt = self
            .session
            .breakpoints
            .get(id)
            .ok_or_else(|| Error::BreakpointNotFound(id.to_string()))?;
        Ok(Response::new(&cmd.name, cmd.seq_num)
            .child(&breakpoint_xml(brkpt))
            .render())
    }

    fn list(&self, cmd: &Command) -> Result<String, Error> {
        let xml: String = self
            .session
            .breakpoints
            .iter()
            .map(breakpoint_xml)
            .collect();
        Ok(Response::new(&cmd.name, cmd.seq_num).child(&xml).render())
    }

    fn update(&mut self, cmd: &Command) -> Result<String, Error> {
        let id = cmd.require('d')?;
        if let Some(lineno) = cmd.option('n') {
            // moving means a new location in the break source, the IDE has to remove and set
            return Err(Error::InvalidOption('n', lineno.to_string()));
        }
        let state: Option<BreakpointState> = cmd.parsed('s')?;
        let hit_value: Option<u32> = cmd.parsed('h')?;
        let hit_condition = cmd.option('o');

        let brkpt = self
            .session
            .breakpoints
            .get(id)
            .ok_or_else(|| Error::BreakpointNotFound(id.to_string()))?;
        let new_hit_value = hit_value.or(brkpt.hit_value);
        let new_hit_condition = hit_condition
            .map(ToString::to_string)
            .or_else(|| brkpt.hit_condition.clone());
        let ignore = ignore_count(new_hit_value, new_hit_condition.as_deref())?;

        if let Some(state) = state.filter(|&state| state != brkpt.state) {
            let command = match state {
                BreakpointState::Enabled => "break-enable",
                BreakpointState::Disabled => "break-disable",
            };
            self.session
                .gdb
                .send_noisy(command, &[id])?
                .expect_done(command)?;
        }
        if hit_value.is_some() || hit_condition.is_some() {
            let count = ignore.unwrap_or(0).to_string();
            self.session
                .gdb
                .send("break-after", &[id, count.as_str()])?
                .expect_done("break-after")?;
        }

        if let Some(brkpt) = self.session.breakpoints.get_mut(id) {
            if let Some(state) = state {
                brkpt.state = state;
            }
            brkpt.hit_value = new_hit_value;
            brkpt.hit_condition = new_hit_condition;
        }

        Ok(Response::new(&cmd.name, cmd.seq_num).render())
    }

    fn remove(&mut self, cmd: &Command) -> Result<String, Error> {
        let id = cmd.require('d')?;
        if !self.session.breakpoints.contains(id) {
            return Err(Error::BreakpointNotFound(id.to_string()));
        }

        self.session
            .gdb
            .send_noisy("break-delete", &[id])?
            .expect_done("break-delete")?;
        self.session.breakpoints.remove(id);
        log::info!(target: "engine", "breakpoint {id} removed");

        Ok(Response::new(&cmd.name, cmd.seq_num).render())
    }
}

/// Number of hits gdb must ignore to honor a DBGp hit condition.
/// Only `>=` (the default) maps onto gdb ignore counts.
fn ignore_count(hit_value: Option<u32>, hit_condition: Option<&str>) -> Result<Option<u32>, Error> {
    match (hit_value, hit_condition) {
        (None, _) => Ok(None),
        (Some(value), None | Some(">=")) => Ok(Some(value.saturating_sub(1))),
        (Some(_), Some(condition)) => Err(Error::InvalidOption('o', condition.to_string())),
    }
}

/// Line of the break source standing for `lineno` of a script whose block starts after `base`.
fn break_location(break_source: &str, base: u32, lineno: u32) -> Result<String, Error> {
    let line = base
        .checked_add(lineno)
        .ok_or_else(|| Error::InvalidOption('n', lineno.to_string()))?;
    Ok(format!("{break_source}:{line}"))
}

fn breakpoint_xml(brkpt: &Breakpoint) -> String {
    let mut xml = format!(
        r#"<breakpoint id="{}" type="{}" state="{}" filename="file://{}" lineno="{}" temporary="{}""#,
        escape(&brkpt.id),
        brkpt.kind,
        brkpt.state,
        escape(&brkpt.filename),
        brkpt.lineno,
        u8::from(brkpt.temporary),
    );
    if let Some(hit_value) = brkpt.hit_value {
        xml.push_str(&format!(r#" hit_value="{hit_value}""#));
    }
    if let Some(condition) = &brkpt.hit_condition {
        xml.push_str(&format!(r#" hit_condition="{}""#, escape(condition)));
    }
    xml.push_str("/>");
    xml
}
