//! DBGp transport: NUL terminated commands in, framed packets out.

use crate::dbgp::packet;
use crate::engine::error::Error;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};

/// Connection to the IDE.
pub trait DbgpTransport {
    /// Read a single command. Return `None` when the IDE closed the connection.
    fn read_command(&mut self) -> Result<Option<String>, Error>;

    /// Frame and send a single payload.
    fn write_packet(&mut self, payload: &str) -> Result<(), Error>;
}

/// TCP connection to a listening IDE.
pub struct TcpTransport {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Result<Self, Error> {
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self { stream, reader })
    }

    /// Connect to the IDE, which plays the server role in DBGp.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, Error> {
        Self::new(TcpStream::connect(addr)?)
    }
}

impl DbgpTransport for TcpTransport {
    fn read_command(&mut self) -> Result<Option<String>, Error> {
        read_command(&mut self.reader)
    }

    fn write_packet(&mut self, payload: &str) -> Result<(), Error> {
        log::debug!(target: "dbgp", "rewind -> ide: {payload}");
        self.stream.write_all(&packet::frame(payload))?;
        self.stream.flush()?;
        Ok(())
    }
}

/// Read bytes up to the NUL terminator. A command cut by the end of stream is still returned.
pub fn read_command<R: BufRead>(reader: &mut R) -> Result<Option<String>, Error> {
    let mut buf = vec![];
    if reader.read_until(0, &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&0) {
        buf.pop();
    }
    let command = String::from_utf8_lossy(&buf).into_owned();
    log::debug!(target: "dbgp", "ide -> rewind: {command}");
    Ok(Some(command))
}
