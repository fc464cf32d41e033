//! Fixed response literals and client-side response completion.
//!
//! The server never frames its replies. A response is either the command's
//! stdout followed by [`TRAILER`], or exactly one of the spawn failure
//! messages with no trailer. The client has to infer the end of a response
//! from those literals.

/// Sent after a command's output has been fully relayed.
pub const TRAILER: &[u8] = b"Command executed.\n";

/// Sent when the process could not be created for lack of resources.
pub const FORK_FAILED: &[u8] = b"Fork failed";

/// Sent when the shell could not be started for any other reason.
pub const EXEC_FAILED: &[u8] = b"Failed to execute command\n";

/// Token that ends the client without contacting the server.
pub const QUIT_COMMAND: &str = "quit";

/// Accumulates response chunks until a complete reply has been seen.
///
/// A command whose own output ends with the trailer text is
/// indistinguishable from a finished reply; that is inherent to the
/// unframed protocol.
#[derive(Debug, Default)]
pub struct ResponseTracker {
    received: Vec<u8>,
}

impl ResponseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one chunk and report whether the response is complete.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        self.received.extend_from_slice(chunk);
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.received.ends_with(TRAILER)
            || self.received == FORK_FAILED
            || self.received == EXEC_FAILED
    }

    /// Whether the reply was a spawn failure rather than command output.
    pub fn is_spawn_failure(&self) -> bool {
        self.received == FORK_FAILED || self.received == EXEC_FAILED
    }

    /// Command output without the trailer, once complete.
    pub fn output(&self) -> &[u8] {
        self.received
            .strip_suffix(TRAILER)
            .unwrap_or(&self.received)
    }

    pub fn len(&self) -> usize {
        self.received.len()
    }

    pub fn is_empty(&self) -> bool {
        self.received.is_empty()
    }
}
