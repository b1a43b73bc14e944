//! Preflight checks of the external tools a session depends on.

use crate::engine::error::Error;
use crate::weak_error;
use once_cell::sync;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use strum_macros::{Display, IntoStaticStr};

/// SemVer version of an external tool, a missing patch number is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version(pub (u32, u32, u32));

impl Version {
    /// Parse a version from the start of strings like "7.0.33-0ubuntu0.16.04.1" or "12.1".
    pub fn parse(s: &str) -> Option<Self> {
        static V_RE: sync::Lazy<Regex> = sync::Lazy::new(|| {
            Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?").expect("must compile")
        });

        let captures = V_RE.captures(s.trim())?;
        let major = weak_error!(captures[1].parse::<u32>())?;
        let minor = weak_error!(captures[2].parse::<u32>())?;
        let patch = match captures.get(3) {
            Some(patch) => weak_error!(patch.as_str().parse::<u32>())?,
            None => 0,
        };
        Some(Version((major, minor, patch)))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor, patch) = self.0;
        write!(f, "{major}.{minor}.{patch}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Tool {
    Php,
    Gdb,
    Rr,
}

impl Tool {
    /// Locate the version in the first line of `--version` output:
    /// "PHP 7.0.33-0ubuntu0.16.04.1 (cli) ...", "GNU gdb (GDB) 7.11.1", "rr version 4.3.0".
    fn version_token(self, first_line: &str) -> Option<&str> {
        let mut tokens = first_line.split_whitespace();
        match self {
            Tool::Php => tokens.nth(1),
            Tool::Gdb | Tool::Rr => tokens.last(),
        }
    }

    fn requirement(self) -> &'static str {
        match self {
            Tool::Php => "7.0.x",
            Tool::Gdb => ">= 7.11.1",
            Tool::Rr => ">= 4.3.0",
        }
    }

    pub fn accepts(self, version: Version) -> bool {
        match self {
            Tool::Php => matches!(version.0, (7, 0, _)),
            Tool::Gdb => version >= Version((7, 11, 1)),
            Tool::Rr => version >= Version((4, 3, 0)),
        }
    }

    /// Check the version line printed by the tool.
    pub fn check_version_line(self, first_line: &str) -> Result<Version, Error> {
        let version = self
            .version_token(first_line)
            .and_then(Version::parse)
            .ok_or_else(|| Error::VersionNotFound(first_line.to_string()))?;
        if !self.accepts(version) {
            return Err(Error::UnsupportedVersion {
                tool: self.into(),
                required: self.requirement(),
                found: version.to_string(),
            });
        }
        Ok(version)
    }
}

/// Find a tool on the search path and make sure its version is supported.
pub fn check_executable(tool: Tool, executable: &str) -> Result<PathBuf, Error> {
    let path = which::which(executable)
        .map_err(|e| Error::ExecutableNotFound(executable.to_string(), e))?;
    log::info!(target: "preflight", "using {tool} from {}", path.display());

    let output = Command::new(&path)
        .arg("--version")
        .output()
        .map_err(|e| Error::Path(path.clone(), e))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or_default();

    let version = tool.check_version_line(first_line)?;
    log::debug!(target: "preflight", "{tool} version {version}");
    Ok(path)
}

/// Absolute path of an existing file or directory, with symlinks resolved.
pub fn absolute_path(path: &Path) -> Result<PathBuf, Error> {
    let resolved = path
        .canonicalize()
        .map_err(|e| Error::Path(path.to_path_buf(), e))?;
    log::debug!(target: "preflight", "{} resolved to {}", path.display(), resolved.display());
    Ok(resolved)
}
