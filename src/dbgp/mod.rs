//! IDE side of the bridge: DBGp commands, responses and packet framing.

mod command;
pub mod packet;
pub mod response;
mod transport;

pub use command::Command;
pub use packet::frame;
pub use response::Response;
pub use transport::{read_command, DbgpTransport, TcpTransport};
