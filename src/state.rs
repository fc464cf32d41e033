//! Connection state machines for both peers.

use crate::error::RelayError;

/// Lifecycle of the server's connection handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    /// No connection; waiting in accept.
    #[default]
    Idle,
    /// Session open, waiting for the next command line.
    Connected,
    /// A command is running and its output is being relayed.
    Executing,
    /// Interrupt received; unwinding.
    ShuttingDown,
}

impl ServerState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Idle -> Connected
    /// - Connected -> Executing
    /// - Connected -> Idle
    /// - Executing -> Connected
    /// - Executing -> Idle
    /// - any non-terminal state -> ShuttingDown
    pub fn can_transition_to(&self, target: ServerState) -> bool {
        use ServerState::*;
        matches!(
            (*self, target),
            (Idle, Connected)
                | (Connected, Executing)
                | (Connected, Idle)
                | (Executing, Connected)
                | (Executing, Idle)
                | (Idle | Connected | Executing, ShuttingDown)
        )
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: ServerState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(RelayError::InvalidStateTransition {
                from: self.name(),
                to: target.name(),
            })
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerState::ShuttingDown)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerState::Idle => "Idle",
            ServerState::Connected => "Connected",
            ServerState::Executing => "Executing",
            ServerState::ShuttingDown => "ShuttingDown",
        }
    }
}

/// Lifecycle of the interactive client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// Session established, nothing read yet.
    #[default]
    Connected,
    /// Waiting on the input collaborator for the next line.
    AwaitingInput,
    /// Writing a command to the server.
    Sending,
    /// Reading the server's response.
    AwaitingResponse,
    /// Loop finished; session released.
    Closed,
}

impl ClientState {
    /// Check if transition to target state is valid.
    pub fn can_transition_to(&self, target: ClientState) -> bool {
        use ClientState::*;
        matches!(
            (*self, target),
            (Connected, AwaitingInput)
                | (AwaitingInput, AwaitingInput)
                | (AwaitingInput, Sending)
                | (Sending, AwaitingResponse)
                | (AwaitingResponse, AwaitingInput)
                | (Connected | AwaitingInput | Sending | AwaitingResponse, Closed)
        )
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: ClientState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(RelayError::InvalidStateTransition {
                from: self.name(),
                to: target.name(),
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientState::Closed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientState::Connected => "Connected",
            ClientState::AwaitingInput => "AwaitingInput",
            ClientState::Sending => "Sending",
            ClientState::AwaitingResponse => "AwaitingResponse",
            ClientState::Closed => "Closed",
        }
    }
}
