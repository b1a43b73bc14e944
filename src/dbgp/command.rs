use crate::engine::error::Error;
use base64::Engine as _;
use std::collections::HashMap;
use std::str::FromStr;

/// Single DBGp command sent by the IDE, like `breakpoint_set -i 4 -t line -f file:///a.php -n 7`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    /// Command verb, e.g. `stack_get`.
    pub name: String,
    /// Command as received.
    pub full_command: String,
    /// Options without their leading `-`. Data passed after `--` lives under the `-` key.
    pub options: HashMap<String, String>,
    pub seq_num: u32,
    /// Run this command against reversed time. Meaningless for most commands.
    pub reverse: bool,
}

impl Command {
    /// Parse a command line.
    ///
    /// Arguments are consumed in `-flag value` pairs, a trailing flag maps to an empty value.
    /// Missing `-i` means sequence number 0. `-z 1` or `-z 0` overrides `reverse_mode`
    /// for this command only.
    pub fn parse(raw: &str, reverse_mode: bool) -> Result<Command, Error> {
        let mut components = raw.split_whitespace();
        let name = components.next().ok_or(Error::EmptyCommand)?;
        let args: Vec<&str> = components.collect();

        let options: HashMap<String, String> = args
            .chunks(2)
            .map(|pair| {
                let flag = pair[0].strip_prefix('-').unwrap_or(pair[0]);
                let value = pair.get(1).copied().unwrap_or_default();
                (flag.to_string(), value.to_string())
            })
            .collect();

        let seq_num = match options.get("i") {
            Some(seq) => seq.parse().map_err(|_| Error::SeqNum(seq.clone()))?,
            None => {
                log::debug!(target: "dbgp", "no sequence number flag -i in command `{raw}`, assume 0");
                0
            }
        };

        let reverse = match options.get("z").map(String::as_str) {
            Some("1") => true,
            Some("0") => false,
            _ => reverse_mode,
        };

        Ok(Command {
            name: name.to_string(),
            full_command: raw.to_string(),
            options,
            seq_num,
            reverse,
        })
    }

    pub fn option(&self, flag: char) -> Option<&str> {
        self.options
            .get(flag.to_string().as_str())
            .map(String::as_str)
    }

    pub fn require(&self, flag: char) -> Result<&str, Error> {
        self.option(flag).ok_or(Error::MissingOption(flag))
    }

    /// Option value parsed into `F`, `None` if the option is absent.
    pub fn parsed<F: FromStr>(&self, flag: char) -> Result<Option<F>, Error> {
        self.option(flag)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| Error::InvalidOption(flag, value.to_string()))
            })
            .transpose()
    }

    /// Decoded base64 data argument (`-- <data>`), if any.
    pub fn data(&self) -> Result<Option<String>, Error> {
        let Some(encoded) = self.option('-') else {
            return Ok(None);
        };
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}
