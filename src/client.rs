//! Interactive client loop.

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::input::{InputEvent, InputReader};
use crate::interrupt::InterruptFlag;
use crate::protocol::{ResponseTracker, QUIT_COMMAND};
use crate::server::DEFAULT_PORT;
use crate::state::ClientState;
use crate::transport::{Received, Session, CHUNK_SIZE};
use crate::Result;

/// Default prompt shown before each command.
pub const DEFAULT_PROMPT: &str = "Enter command: ";

/// How long to wait for more bytes after a reply that matches a spawn
/// failure message before accepting it as one.
pub const SPAWN_FAILURE_GRACE: Duration = Duration::from_millis(200);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host name or address of the server.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Prompt text.
    pub prompt: String,
    /// Where to persist line-editing history.
    pub history_file: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            prompt: DEFAULT_PROMPT.to_string(),
            history_file: None,
        }
    }
}

/// Why the client loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// The user typed `quit`.
    Quit,
    /// The input collaborator reported end-of-input.
    EndOfInput,
    /// The server closed the connection.
    ServerDisconnected,
    /// SIGINT or Ctrl-C at the prompt.
    Interrupted,
}

/// One client session driving a server connection.
pub struct Client<W: Write> {
    session: Session,
    state: ClientState,
    prompt: String,
    out: W,
}

impl<W: Write + Send> Client<W> {
    /// Wrap an open session; responses are printed to `out`.
    pub fn new(session: Session, out: W) -> Self {
        Self {
            session,
            state: ClientState::Connected,
            prompt: DEFAULT_PROMPT.to_string(),
            out,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Connect to `addr` and wrap the session.
    pub async fn connect(addr: SocketAddr, out: W) -> Result<Self> {
        Ok(Self::new(Session::open(addr).await?, out))
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.session.peer_addr()
    }

    /// Give back the output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Run until quit, end-of-input, disconnect, failure or interrupt.
    ///
    /// The session is closed on every path. `Err` means a send or receive
    /// failed.
    pub async fn run(
        &mut self,
        input: &mut InputReader,
        interrupt: &InterruptFlag,
    ) -> Result<ClientExit> {
        let result = self.drive(input, interrupt).await;
        self.session.close().await;
        if !self.state.is_terminal() {
            self.state.transition_to(ClientState::Closed)?;
        }
        debug!("Socket closed");
        result
    }

    async fn drive(
        &mut self,
        input: &mut InputReader,
        interrupt: &InterruptFlag,
    ) -> Result<ClientExit> {
        self.state.transition_to(ClientState::AwaitingInput)?;

        while !interrupt.is_set() {
            let event = tokio::select! {
                biased;
                _ = interrupt.wait() => break,
                event = input.next_line(&self.prompt) => event?,
            };

            let line = match event {
                InputEvent::Line(line) => line,
                InputEvent::EndOfInput => {
                    writeln!(self.out, "\nEOF received, exiting.")?;
                    return Ok(ClientExit::EndOfInput);
                }
                InputEvent::Interrupted => {
                    interrupt.set();
                    break;
                }
            };

            if line.is_empty() {
                self.state.transition_to(ClientState::AwaitingInput)?;
                continue;
            }
            if line == QUIT_COMMAND {
                return Ok(ClientExit::Quit);
            }

            self.state.transition_to(ClientState::Sending)?;
            debug!("Sending command to server");
            self.session.send_all(line.as_bytes()).await?;

            self.state.transition_to(ClientState::AwaitingResponse)?;
            debug!("Waiting for server response");
            if let Some(exit) = self.receive_response(interrupt).await? {
                return Ok(exit);
            }
            self.state.transition_to(ClientState::AwaitingInput)?;
        }

        Ok(ClientExit::Interrupted)
    }

    /// Print chunks until the reply is complete.
    ///
    /// Returns `Some` when the loop has to stop instead of prompting again.
    async fn receive_response(&mut self, interrupt: &InterruptFlag) -> Result<Option<ClientExit>> {
        let mut tracker = ResponseTracker::new();
        let mut early = None;

        loop {
            let received = match early.take() {
                Some(received) => received,
                None => tokio::select! {
                    biased;
                    _ = interrupt.wait() => return Ok(Some(ClientExit::Interrupted)),
                    received = self.session.recv_chunk(CHUNK_SIZE) => received?,
                },
            };

            let chunk = match received {
                Received::Data(chunk) => chunk,
                Received::EndOfStream => {
                    if tracker.is_spawn_failure() {
                        writeln!(self.out)?;
                    }
                    writeln!(self.out, "Server disconnected")?;
                    return Ok(Some(ClientExit::ServerDisconnected));
                }
            };

            if tracker.is_empty() {
                write!(self.out, "Received: ")?;
            }
            self.out.write_all(&chunk)?;
            self.out.flush()?;

            if !tracker.push(&chunk) {
                continue;
            }
            if !tracker.is_spawn_failure() {
                return Ok(None);
            }

            // A command can print exactly a failure literal; its trailer
            // then follows shortly after.
            match self.recv_within(SPAWN_FAILURE_GRACE, interrupt).await? {
                Some(more) => early = Some(more),
                None => {
                    // Failure replies carry no newline of their own.
                    writeln!(self.out)?;
                    return Ok(None);
                }
            }
        }
    }

    /// One receive bounded by `limit`; `None` when nothing arrived in time.
    async fn recv_within(
        &mut self,
        limit: Duration,
        interrupt: &InterruptFlag,
    ) -> Result<Option<Received>> {
        tokio::select! {
            biased;
            _ = interrupt.wait() => Ok(None),
            received = tokio::time::timeout(limit, self.session.recv_chunk(CHUNK_SIZE)) => {
                match received {
                    Ok(received) => Ok(Some(received?)),
                    Err(_) => Ok(None),
                }
            }
        }
    }
}
