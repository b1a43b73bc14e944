use crate::engine::error::Error;
use crate::{muted_error, weak_error};
use log::error;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::Path;

/// Defaults for command line options. Command line values win.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub gdb: Option<String>,
    pub rr: Option<String>,
    pub php: Option<String>,
    /// IDE address, `host:port`.
    pub ide: Option<String>,
    pub idekey: Option<String>,
    pub break_source: Option<String>,
    /// Show all gdb/mi traffic, not only breakpoint management.
    pub noisy_gdb: bool,
}

impl Config {
    const DEFAULT_PATH: &'static str = ".config/rewind-dbgp/config.toml";

    /// Load configuration from file. Return [`None`] on errors.
    pub fn from_file(path: Option<&Path>) -> Option<Self> {
        let data = match path {
            None => {
                let path = home::home_dir()?;
                let path = path.join(Self::DEFAULT_PATH);
                muted_error!(read_to_string(path))?
            }
            Some(path) => match read_to_string(path) {
                Ok(data) => data,
                Err(err) => {
                    error!("Error while load config file {}: {err}", path.display());
                    return None;
                }
            },
        };

        weak_error!(toml::de::from_str(&data))
    }
}

/// Read a source map: a TOML table from script path to the line preceding
/// the script's block in the break source.
pub fn load_source_map(path: &Path) -> Result<HashMap<String, u32>, Error> {
    let data = read_to_string(path).map_err(|e| Error::Path(path.to_path_buf(), e))?;
    parse_source_map(&data).map_err(|e| Error::Config(path.to_path_buf(), e))
}

fn parse_source_map(data: &str) -> Result<HashMap<String, u32>, String> {
    toml::de::from_str(data).map_err(|e| e.message().to_string())
}
