//! Process-wide interrupt flag and SIGINT wiring.
//!
//! The flag is a one-way latch: once set it stays set for the lifetime of
//! the process. Both loops poll it between iterations and race every
//! blocking call against [`InterruptFlag::wait`].

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::RelayError;
use crate::Result;

/// Shared cancellation signal, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    token: CancellationToken,
}

impl InterruptFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Further calls are no-ops.
    pub fn set(&self) {
        self.token.cancel();
    }

    /// Whether the flag has been set.
    pub fn is_set(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the flag is set.
    pub async fn wait(&self) {
        self.token.cancelled().await
    }
}

/// Install the SIGINT listener that sets `flag`.
///
/// Must be called from within a tokio runtime. The returned task ends
/// after the first signal.
pub fn install_sigint_handler(flag: InterruptFlag) -> Result<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(RelayError::SignalInstall)?;
        Ok(tokio::spawn(async move {
            if sigint.recv().await.is_some() {
                info!("Caught signal, exiting gracefully...");
                flag.set();
            }
        }))
    }

    #[cfg(not(unix))]
    {
        Ok(tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Caught signal, exiting gracefully...");
                    flag.set();
                }
                Err(e) => tracing::error!("{}", RelayError::SignalInstall(e)),
            }
        }))
    }
}
