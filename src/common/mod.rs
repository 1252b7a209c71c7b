//! Shared infrastructure for adaq-rs binaries
//!
//! - CLI argument structs (cli)
//! - Ctrl+C shutdown channel (shutdown)

pub mod cli;
pub mod shutdown;

pub use cli::{CommonArgs, DecoderArgs, EmulatorArgs, ReaderArgs, ZleDumpArgs};
pub use shutdown::{setup_shutdown, ShutdownReceiver, ShutdownSender, ShutdownSignal};
