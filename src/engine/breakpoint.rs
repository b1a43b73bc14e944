use crate::engine::error::Error;
use indexmap::map::Entry;
use indexmap::IndexMap;
use strum_macros::{Display, EnumString};

/// DBGp breakpoint types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString, Display)]
pub enum BreakpointKind {
    #[strum(serialize = "line")]
    Line,
    #[strum(serialize = "call")]
    Call,
    #[strum(serialize = "return")]
    Return,
    #[strum(serialize = "exception")]
    Exception,
    #[strum(serialize = "conditional")]
    Conditional,
    #[strum(serialize = "watch")]
    Watch,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString, Display)]
pub enum BreakpointState {
    #[strum(serialize = "enabled")]
    Enabled,
    #[strum(serialize = "disabled")]
    Disabled,
}

/// Breakpoint known to the IDE and backed by a gdb breakpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct Breakpoint {
    /// DBGp breakpoint id, equal to the gdb breakpoint number.
    pub id: String,
    pub kind: BreakpointKind,
    pub state: BreakpointState,
    /// One-shot breakpoint, forgotten after the first hit.
    pub temporary: bool,
    pub filename: String,
    pub lineno: u32,
    /// gdb location the breakpoint was inserted at.
    pub location: String,
    pub hit_value: Option<u32>,
    pub hit_condition: Option<String>,
}

impl Breakpoint {
    pub fn is_enabled(&self) -> bool {
        self.state == BreakpointState::Enabled
    }
}

/// Mapping between IDE visible breakpoints and gdb breakpoints.
#[derive(Default, Debug)]
pub struct BreakpointRegistry {
    breakpoints: IndexMap<String, Breakpoint>,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new breakpoint. Ids are unique across the registry.
    pub fn insert(&mut self, brkpt: Breakpoint) -> Result<&Breakpoint, Error> {
        match self.breakpoints.entry(brkpt.id.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateBreakpoint(brkpt.id)),
            Entry::Vacant(entry) => Ok(entry.insert(brkpt)),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Breakpoint> {
        self.breakpoints.shift_remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Breakpoint> {
        self.breakpoints.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Breakpoint> {
        self.breakpoints.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.breakpoints.contains_key(id)
    }

    /// Return true if `id` belongs to an enabled one-shot breakpoint.
    pub fn is_enabled_temporary(&self, id: &str) -> bool {
        self.get(id)
            .map(|brkpt| brkpt.temporary && brkpt.is_enabled())
            .unwrap_or(false)
    }

    /// Return true if `id` belongs to an enabled ordinary (non one-shot) breakpoint.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.get(id)
            .map(|brkpt| !brkpt.temporary && brkpt.is_enabled())
            .unwrap_or(false)
    }

    /// Breakpoints in order of creation.
    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }
}
