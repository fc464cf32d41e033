//! Process spawning capability.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};

use super::result::SpawnFailure;

/// Get the default shell for the current platform.
pub fn default_shell() -> &'static str {
    #[cfg(unix)]
    {
        "/bin/sh"
    }
    #[cfg(windows)]
    {
        "cmd.exe"
    }
}

#[cfg(unix)]
const SHELL_COMMAND_FLAG: &str = "-c";
#[cfg(windows)]
const SHELL_COMMAND_FLAG: &str = "/C";

/// Something that can start a process for a command line.
///
/// The returned child must have its stdout piped so the executor can
/// stream it.
pub trait Spawn: Send + Sync {
    fn spawn(&self, command_line: &str) -> Result<Child, SpawnFailure>;
}

/// Runs command lines through the system shell.
#[derive(Debug, Clone)]
pub struct ShellSpawner {
    shell: PathBuf,
}

impl ShellSpawner {
    /// Use `shell` as the interpreter (invoked as `shell -c <line>`).
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }
}

impl Default for ShellSpawner {
    fn default() -> Self {
        Self::new(default_shell())
    }
}

impl Spawn for ShellSpawner {
    fn spawn(&self, command_line: &str) -> Result<Child, SpawnFailure> {
        // stderr is inherited: only stdout travels back to the client.
        Command::new(&self.shell)
            .arg(SHELL_COMMAND_FLAG)
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(SpawnFailure::from_io)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_default_shell() {
        assert_eq!(ShellSpawner::default().shell(), Path::new("/bin/sh"));
    }

    #[tokio::test]
    async fn test_spawn_captures_stdout() {
        let mut child = ShellSpawner::default().spawn("echo spawned").unwrap();
        let mut out = String::new();
        child
            .stdout
            .take()
            .unwrap()
            .read_to_string(&mut out)
            .await
            .unwrap();
        assert_eq!(out, "spawned\n");
        assert!(child.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn test_missing_shell_is_exec_failure() {
        let spawner = ShellSpawner::new("/nonexistent/shell");
        let failure = spawner.spawn("echo hi").unwrap_err();
        assert!(matches!(failure, SpawnFailure::Exec(_)));
    }
}
