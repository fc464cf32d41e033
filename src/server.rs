//! Server loop: sequential accept, one command at a time per session.
//!
//! ```text
//! Idle --accept--> Connected --line--> Executing --trailer--> Connected
//!   ^                  |                    |
//!   +--peer closed / transport failure------+
//!
//! any state --interrupt--> ShuttingDown
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::RelayError;
use crate::execution::{default_shell, CommandExecutor, ExecutionOutcome, ShellSpawner};
use crate::interrupt::InterruptFlag;
use crate::state::ServerState;
use crate::transport::{Listener, Received, Session, CHUNK_SIZE};
use crate::Result;

/// Default TCP port for both peers.
pub const DEFAULT_PORT: u16 = 8080;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub host: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Interpreter used for command lines.
    pub shell: PathBuf,
}

impl ServerConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            host,
            port,
            ..Self::default()
        }
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            shell: PathBuf::from(default_shell()),
        }
    }
}

/// Why a session stopped being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed the connection.
    PeerClosed,
    /// A send or receive failed; the session was dropped.
    TransportFailed,
    /// Shutdown was requested.
    Interrupted,
}

/// The command server.
pub struct Server {
    listener: Listener,
    executor: CommandExecutor,
    state: ServerState,
}

impl Server {
    /// Bind the listening endpoint described by `config`.
    pub fn bind(config: &ServerConfig) -> Result<Self> {
        let listener = Listener::bind(config.bind_address())?;
        let executor = CommandExecutor::new(Arc::new(ShellSpawner::new(&config.shell)));
        Ok(Self {
            listener,
            executor,
            state: ServerState::Idle,
        })
    }

    /// Replace the executor (used to plug in a different spawner).
    pub fn with_executor(mut self, executor: CommandExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Serve connections one after another until `interrupt` is set.
    ///
    /// Returns `Ok(())` on graceful shutdown. An error means the listening
    /// endpoint failed and the server cannot continue.
    pub async fn run(mut self, interrupt: InterruptFlag) -> Result<()> {
        info!("Server listening on {}", self.local_addr()?);

        while !interrupt.is_set() {
            let mut session = match self.listener.accept(&interrupt).await {
                Ok(Some(session)) => session,
                Ok(None) => break,
                Err(e) if is_transient_accept_error(&e) => {
                    warn!("{}", e);
                    continue;
                }
                Err(e) => {
                    self.state.transition_to(ServerState::ShuttingDown)?;
                    return Err(e);
                }
            };
            self.state.transition_to(ServerState::Connected)?;

            let end = self.serve_session(&mut session, &interrupt).await?;
            session.close().await;
            debug!("Client connection closed");

            if end == SessionEnd::Interrupted {
                break;
            }
            self.state.transition_to(ServerState::Idle)?;
        }

        self.state.transition_to(ServerState::ShuttingDown)?;
        debug!("Server shutting down");
        Ok(())
    }

    /// Read command lines from `session` and execute them in order.
    ///
    /// Transport failures are logged here and end only this session.
    pub async fn serve_session(
        &mut self,
        session: &mut Session,
        interrupt: &InterruptFlag,
    ) -> Result<SessionEnd> {
        loop {
            if interrupt.is_set() {
                return Ok(SessionEnd::Interrupted);
            }

            let received = tokio::select! {
                biased;
                _ = interrupt.wait() => return Ok(SessionEnd::Interrupted),
                received = session.recv_chunk(CHUNK_SIZE) => received,
            };

            let bytes = match received {
                Ok(Received::Data(bytes)) => bytes,
                Ok(Received::EndOfStream) => {
                    debug!("Client disconnected");
                    return Ok(SessionEnd::PeerClosed);
                }
                Err(e) => {
                    error!("{}", e);
                    return Ok(SessionEnd::TransportFailed);
                }
            };

            let command = String::from_utf8_lossy(&bytes);
            info!("Received: {}", command);

            self.state.transition_to(ServerState::Executing)?;
            match self.executor.execute(&command, session, interrupt).await {
                Ok(ExecutionOutcome::Interrupted) => return Ok(SessionEnd::Interrupted),
                Ok(outcome) => debug!("Command finished: {:?}", outcome),
                Err(e) => {
                    error!("{}", e);
                    return Ok(SessionEnd::TransportFailed);
                }
            }
            self.state.transition_to(ServerState::Connected)?;
        }
    }
}

/// Errors on a single pending connection that leave the listener usable.
fn is_transient_accept_error(err: &RelayError) -> bool {
    use std::io::ErrorKind::*;
    match err {
        RelayError::Accept(e) => matches!(
            e.kind(),
            ConnectionAborted | ConnectionReset | ConnectionRefused | Interrupted | WouldBlock
        ),
        _ => false,
    }
}

/// Bind according to `config` and serve until interrupted.
pub async fn serve(config: &ServerConfig, interrupt: InterruptFlag) -> Result<()> {
    Server::bind(config)?.run(interrupt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loopback() -> ServerConfig {
        ServerConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address().to_string(), "0.0.0.0:8080");
        assert_eq!(config.shell, PathBuf::from(default_shell()));
    }

    #[test]
    fn test_server_config_custom() {
        let config = loopback().with_shell("/bin/bash");
        assert_eq!(config.bind_address().to_string(), "127.0.0.1:0");
        assert_eq!(config.shell, PathBuf::from("/bin/bash"));
    }

    #[test]
    fn test_transient_accept_errors() {
        let aborted = RelayError::Accept(std::io::ErrorKind::ConnectionAborted.into());
        assert!(is_transient_accept_error(&aborted));

        let fatal = RelayError::Accept(std::io::ErrorKind::PermissionDenied.into());
        assert!(!is_transient_accept_error(&fatal));

        let other = RelayError::Send(std::io::ErrorKind::ConnectionAborted.into());
        assert!(!is_transient_accept_error(&other));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_setup_error() {
        let first = Server::bind(&loopback()).unwrap();
        let taken = first.local_addr().unwrap();

        // SO_REUSEADDR does not allow two listeners on the same port.
        let err = match Server::bind(&ServerConfig::new(taken.ip(), taken.port())) {
            Ok(_) => panic!("second bind unexpectedly succeeded"),
            Err(e) => e,
        };
        assert!(err.is_setup());
    }

    #[tokio::test]
    async fn test_run_returns_when_interrupted() {
        let server = Server::bind(&loopback()).unwrap();
        assert_eq!(server.state(), ServerState::Idle);

        let interrupt = InterruptFlag::new();
        let handle = tokio::spawn(server.run(interrupt.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        interrupt.set();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_with_flag_already_set() {
        let server = Server::bind(&loopback()).unwrap();
        let interrupt = InterruptFlag::new();
        interrupt.set();

        let result = tokio::time::timeout(Duration::from_secs(2), server.run(interrupt)).await;
        assert!(result.unwrap().is_ok());
    }
}
