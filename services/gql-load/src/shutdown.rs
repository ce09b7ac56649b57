//! Process signals that end a run early.
//!
//! Ctrl-C and, on unix, SIGTERM both request a graceful stop: the run is
//! cancelled, in-flight requests drain, the request log is closed and partial
//! results are saved by the caller.

use crate::runner::RunContext;
use tracing::info;

/// Listens for Ctrl-C everywhere, plus SIGTERM on unix.
pub struct ShutdownSignal {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Install the handlers. Must be called inside a tokio runtime.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    /// Name of the next signal received, or `None` once listening fails.
    pub async fn recv(&mut self) -> Option<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                result = tokio::signal::ctrl_c() => result.ok().map(|_| "SIGINT"),
                received = self.terminate.recv() => received.map(|_| "SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok().map(|_| "SIGINT")
        }
    }

    /// Wait for the first signal and cancel `context`.
    ///
    /// Returns the signal name, or `None` if no signal can be received.
    pub async fn cancel_on_signal(&mut self, context: &RunContext) -> Option<&'static str> {
        let signal = self.recv().await?;
        info!(signal, "Received shutdown signal, finishing in-flight requests");
        context.cancel();
        Some(signal)
    }
}
