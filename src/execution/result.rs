//! Execution result types.

use std::fmt;
use std::time::Duration;

use crate::protocol::{EXEC_FAILED, FORK_FAILED};

/// How a single command execution ended.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// The process ran; its output and the trailer were relayed.
    Completed {
        /// Exit code, `None` when the process was killed by a signal.
        exit_code: Option<i32>,
        /// Total stdout bytes relayed.
        bytes_relayed: usize,
        /// Number of chunks sent.
        chunks: usize,
        /// Wall time from spawn to exit.
        duration: Duration,
    },
    /// The process could not be started; the failure message was sent.
    SpawnFailed(SpawnFailure),
    /// Shutdown was requested mid-command; the process was killed.
    Interrupted,
}

impl ExecutionOutcome {
    /// Check if the command ran and exited with code 0.
    pub fn success(&self) -> bool {
        matches!(self, Self::Completed { exit_code: Some(0), .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Reason a process could not be started.
#[derive(Debug)]
pub enum SpawnFailure {
    /// Process creation itself failed (resource exhaustion).
    Fork(std::io::Error),
    /// The shell could not be executed.
    Exec(std::io::Error),
}

impl SpawnFailure {
    /// Classify a spawn error.
    ///
    /// `EAGAIN` and `ENOMEM` come from the process-creation step; anything
    /// else means the interpreter itself could not be run.
    pub fn from_io(err: std::io::Error) -> Self {
        #[cfg(unix)]
        if matches!(err.raw_os_error(), Some(libc::EAGAIN | libc::ENOMEM)) {
            return Self::Fork(err);
        }
        Self::Exec(err)
    }

    /// The literal reported to the client.
    pub fn message(&self) -> &'static [u8] {
        match self {
            Self::Fork(_) => FORK_FAILED,
            Self::Exec(_) => EXEC_FAILED,
        }
    }
}

impl fmt::Display for SpawnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fork(e) => write!(f, "fork failed: {}", e),
            Self::Exec(e) => write!(f, "failed to execute command: {}", e),
        }
    }
}
