//! Command execution engine.
//!
//! Each command line runs in its own shell process. Its stdout is read
//! incrementally and relayed to the session chunk by chunk, then the
//! trailer is sent once the process has exited.
//!
//! # Example
//!
//! ```no_run
//! use shell_relay::execution::CommandExecutor;
//! use shell_relay::{InterruptFlag, Session};
//!
//! # async fn demo(session: &mut Session) -> shell_relay::Result<()> {
//! let executor = CommandExecutor::shell();
//! let outcome = executor
//!     .execute("echo hello", session, &InterruptFlag::new())
//!     .await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

mod executor;
mod result;
mod spawner;

pub use executor::CommandExecutor;
pub use result::{ExecutionOutcome, SpawnFailure};
pub use spawner::{default_shell, ShellSpawner, Spawn};
