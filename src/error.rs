//! Error types for shell-relay.

use std::net::SocketAddr;

use thiserror::Error;

/// Main error type for shell-relay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Host name could not be resolved to a socket address.
    #[error("no such host: {0}")]
    Resolve(String),

    /// Listening socket could not be bound.
    #[error("bind to {addr} failed: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Outgoing connection could not be established.
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// SIGINT handler could not be installed.
    #[error("failed to install signal handler: {0}")]
    SignalInstall(#[source] std::io::Error),

    /// The listening endpoint failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// Writing to a session failed.
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    /// Reading from a session failed.
    #[error("receive failed: {0}")]
    Recv(#[source] std::io::Error),

    /// Operation attempted on a session that was already closed.
    #[error("session closed")]
    SessionClosed,

    /// The local input collaborator failed.
    #[error("input error: {0}")]
    Input(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: &'static str, to: &'static str },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Whether this error happened while setting the process up.
    ///
    /// Setup errors are fatal: the binaries report them and exit with 1.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::Resolve(_) | Self::Bind { .. } | Self::Connect { .. } | Self::SignalInstall(_)
        )
    }

    /// Whether this error is a mid-session transport failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Send(_) | Self::Recv(_) | Self::SessionClosed)
    }
}

/// Convenience Result type for shell-relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_display() {
        let err = RelayError::Resolve("nowhere.invalid".into());
        assert!(err.to_string().contains("no such host"));
        assert!(err.to_string().contains("nowhere.invalid"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let relay_err: RelayError = io_err.into();
        assert!(matches!(relay_err, RelayError::Io(_)));
        assert!(relay_err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_setup_classification() {
        let bind = RelayError::Bind {
            addr: "0.0.0.0:8080".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(bind.is_setup());
        assert!(!bind.is_transport());

        let send = RelayError::Send(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(!send.is_setup());
        assert!(send.is_transport());
    }

    #[test]
    fn test_state_transition_display() {
        let err = RelayError::InvalidStateTransition {
            from: "Idle",
            to: "Executing",
        };
        assert_eq!(
            err.to_string(),
            "invalid state transition from Idle to Executing"
        );
    }
}
