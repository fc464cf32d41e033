//! Command execution engine.

use std::sync::Arc;
use std::time::Instant;

use tokio::io::AsyncReadExt;
use tracing::{debug, error, warn};

use super::result::{ExecutionOutcome, SpawnFailure};
use super::spawner::{ShellSpawner, Spawn};
use crate::interrupt::InterruptFlag;
use crate::protocol::TRAILER;
use crate::transport::{Session, CHUNK_SIZE};
use crate::Result;

/// Runs one command per call and relays its output to a session.
#[derive(Clone)]
pub struct CommandExecutor {
    spawner: Arc<dyn Spawn>,
}

impl CommandExecutor {
    /// Create a new command executor.
    pub fn new(spawner: Arc<dyn Spawn>) -> Self {
        Self { spawner }
    }

    /// Executor backed by the platform's default shell.
    pub fn shell() -> Self {
        Self::new(Arc::new(ShellSpawner::default()))
    }

    /// Run `command_line` and relay its stdout to `session`.
    ///
    /// Output is forwarded as it is produced, at most [`CHUNK_SIZE`] bytes
    /// per send. The trailer follows once the process has exited, whatever
    /// its status. A spawn failure is reported to the client as data and
    /// is not an error. `Err` means the session itself failed.
    pub async fn execute(
        &self,
        command_line: &str,
        session: &mut Session,
        interrupt: &InterruptFlag,
    ) -> Result<ExecutionOutcome> {
        let start = Instant::now();

        let mut child = match self.spawner.spawn(command_line) {
            Ok(child) => child,
            Err(failure) => return report_spawn_failure(failure, session).await,
        };

        let Some(mut stdout) = child.stdout.take() else {
            let failure = SpawnFailure::Exec(std::io::Error::other("stdout was not captured"));
            return report_spawn_failure(failure, session).await;
        };

        let mut buf = [0u8; CHUNK_SIZE];
        let mut bytes_relayed = 0;
        let mut chunks = 0;

        loop {
            let read = tokio::select! {
                biased;
                _ = interrupt.wait() => {
                    debug!("Shutdown requested, abandoning command");
                    let _ = child.start_kill();
                    return Ok(ExecutionOutcome::Interrupted);
                }
                read = stdout.read(&mut buf) => read,
            };

            let n = match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!("Reading command output failed: {}", e);
                    break;
                }
            };

            session.send_all(&buf[..n]).await?;
            bytes_relayed += n;
            chunks += 1;
        }

        let status = tokio::select! {
            biased;
            _ = interrupt.wait() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = status else {
            let _ = child.start_kill();
            return Ok(ExecutionOutcome::Interrupted);
        };
        debug!("Child process completed");

        let exit_code = match status {
            Ok(status) => {
                match status.code() {
                    Some(code) => debug!("Child process exited with status {}", code),
                    None => debug!("Child process terminated abnormally"),
                }
                status.code()
            }
            Err(e) => {
                warn!("Waiting for child process failed: {}", e);
                None
            }
        };

        session.send_all(TRAILER).await?;

        Ok(ExecutionOutcome::Completed {
            exit_code,
            bytes_relayed,
            chunks,
            duration: start.elapsed(),
        })
    }
}

async fn report_spawn_failure(
    failure: SpawnFailure,
    session: &mut Session,
) -> Result<ExecutionOutcome> {
    error!("{}", failure);
    session.send_all(failure.message()).await?;
    Ok(ExecutionOutcome::SpawnFailed(failure))
}
