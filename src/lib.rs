pub mod config;
pub mod dbgp;
pub mod engine;
pub mod log;
pub mod mi;
pub mod replay;
pub mod version;
