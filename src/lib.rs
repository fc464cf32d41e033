//! # shell-relay
//!
//! Minimal remote command execution over plain TCP.
//!
//! `relay-server` accepts one connection at a time, runs every line it
//! receives through the system shell and streams the command's stdout
//! back, followed by a fixed trailer. `relay-client` is the interactive
//! prompt on the other end.
//!
//! There is no authentication, encryption or sandboxing: anyone who can
//! reach the port can run arbitrary commands as the server's user.
//!
//! ## Quick Start
//!
//! ```no_run
//! use shell_relay::{InterruptFlag, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> shell_relay::Result<()> {
//!     shell_relay::logging::try_init(false, None).ok();
//!
//!     let interrupt = InterruptFlag::new();
//!     shell_relay::interrupt::install_sigint_handler(interrupt.clone())?;
//!
//!     shell_relay::server::serve(&ServerConfig::default(), interrupt).await
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod execution;
pub mod input;
pub mod interrupt;
pub mod logging;
pub mod protocol;
pub mod resolver;
pub mod server;
pub mod state;
pub mod transport;

// Re-export commonly used types
pub use client::{Client, ClientConfig, ClientExit};
pub use error::{RelayError, Result};
pub use execution::{CommandExecutor, ExecutionOutcome, ShellSpawner, Spawn, SpawnFailure};
pub use input::{EditorInput, InputEvent, InputReader, LineSource, TerminalGuard};
pub use interrupt::InterruptFlag;
pub use server::{Server, ServerConfig, SessionEnd};
pub use state::{ClientState, ServerState};
pub use transport::{Listener, Received, Session, CHUNK_SIZE};
