//! Graceful shutdown signal handling.
//!
//! [`ShutdownTrigger`] listens for OS termination signals (SIGTERM/SIGINT on
//! Unix, Ctrl+C on Windows) and cancels the orchestrator's
//! [`CancellationToken`] on the first one. Once the handlers are installed
//! the OS no longer terminates the process on these signals, so repeated
//! signals are absorbed: cancelling an already cancelled token is a no-op.

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Converts termination signals into a single cancellation.
#[allow(missing_debug_implementations)]
pub struct ShutdownTrigger {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl ShutdownTrigger {
    /// Installs the signal handlers and spawns the background listener.
    ///
    /// The listener exits after the first signal or when `token` is cancelled
    /// by other means.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if signal registration fails.
    #[allow(clippy::unnecessary_wraps)]
    pub fn try_new(token: CancellationToken) -> Result<Self, std::io::Error> {
        let inner = token.clone();
        let task_tracker = TaskTracker::new();

        #[cfg(unix)]
        {
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            task_tracker.spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("received SIGTERM, shutting down");
                        inner.cancel();
                    },
                    _ = sigint.recv() => {
                        tracing::info!("received SIGINT, shutting down");
                        inner.cancel();
                    },
                    () = inner.cancelled() => {},
                }
            });
        }

        #[cfg(windows)]
        {
            task_tracker.spawn(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("received Ctrl+C, shutting down");
                        inner.cancel();
                    },
                    () = inner.cancelled() => {},
                }
            });
        }

        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token: token,
        })
    }

    /// Fires the cancellation without an OS signal.
    pub fn trigger(&self) {
        self.cancellation_token.cancel();
    }

    /// Returns a clone of the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Waits for the cancellation and for the listener task to exit.
    pub async fn recv(&self) {
        self.cancellation_token.cancelled().await;
        self.task_tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn trigger_cancels_and_releases_listener() {
        let token = CancellationToken::new();
        let trigger = ShutdownTrigger::try_new(token.clone()).unwrap();

        trigger.trigger();
        trigger.trigger();
        timeout(Duration::from_secs(1), trigger.recv()).await.unwrap();
        assert!(token.is_cancelled());
        assert!(trigger.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn external_cancellation_releases_listener() {
        let token = CancellationToken::new();
        let trigger = ShutdownTrigger::try_new(token.clone()).unwrap();

        token.cancel();
        timeout(Duration::from_secs(1), trigger.recv()).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn repeated_sigterm_cancels_once_and_keeps_process_alive() {
        let token = CancellationToken::new();
        let trigger = ShutdownTrigger::try_new(token.clone()).unwrap();
        let pid = std::process::id().to_string();

        for _ in 0..2 {
            let status = std::process::Command::new("kill")
                .args(["-s", "TERM", &pid])
                .status();
            if status.is_err() {
                // No `kill` binary available; nothing to observe.
                return;
            }
        }

        timeout(Duration::from_secs(5), trigger.recv()).await.unwrap();
        assert!(token.is_cancelled());
    }
}
