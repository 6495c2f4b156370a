//! Lifecycle orchestration.
//!
//! The [`Orchestrator`] owns the process-wide [`CancellationToken`] and a
//! [`TaskTracker`]. Every registered server is launched as its own tracked
//! task and blocks on the token. Triggering shutdown is a single, idempotent
//! `cancel()`; each server then runs its own shutdown sequence in parallel
//! with the others, and [`Orchestrator::run`] returns only once every tracked
//! task has finished.
//!
//! ```text
//! Idle ──run──► Running ──token──► ShutdownRequested ──► Draining ──all done──► Terminated
//! ```
//!
//! A server task that fails drops its guard on the token, so a crashed or
//! panicked server brings its siblings down instead of leaving the process
//! half-alive.

use crate::server::{
    error::ServerError,
    protocol::{Outcome, Protocol, ProtocolServer},
};
use core::fmt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// A unit the orchestrator can launch.
pub trait Lifecycle: Send {
    fn name(&self) -> &'static str;

    /// Runs until `shutdown` fires and the unit has finished cleaning up.
    fn start(self: Box<Self>, shutdown: CancellationToken)
    -> BoxFuture<'static, Result<Outcome, ServerError>>;
}

impl<P: Protocol> Lifecycle for ProtocolServer<P> {
    fn name(&self) -> &'static str {
        ProtocolServer::name(self)
    }

    fn start(
        self: Box<Self>,
        shutdown: CancellationToken,
    ) -> BoxFuture<'static, Result<Outcome, ServerError>> {
        Box::pin(ProtocolServer::start(*self, shutdown))
    }
}

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    Running,
    ShutdownRequested,
    Draining,
    Terminated,
}

/// How every registered server ended, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub outcomes: Vec<(&'static str, Outcome)>,
}

impl Report {
    /// The outcome of the server registered as `name`.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<Outcome> {
        self.outcomes
            .iter()
            .find(|(server, _)| *server == name)
            .map(|(_, outcome)| *outcome)
    }
}

/// Launches servers and waits for all of them to shut down.
pub struct Orchestrator {
    shutdown: CancellationToken,
    tracker: TaskTracker,
    servers: Vec<Box<dyn Lifecycle>>,
    phase: watch::Sender<Phase>,
}

impl Orchestrator {
    #[must_use]
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            servers: Vec::new(),
            phase,
        }
    }

    /// A handle to the shared cancellation signal. Cancelling any clone
    /// requests shutdown.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Observes phase transitions.
    #[must_use]
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Adds a server to be launched by [`run`](Self::run).
    pub fn register(&mut self, server: impl Lifecycle + 'static) -> &mut Self {
        self.servers.push(Box::new(server));
        self
    }

    /// Launches every registered server, waits for the shutdown signal and
    /// then for every server to finish.
    ///
    /// # Errors
    ///
    /// Returns the first server failure once all servers have finished.
    pub async fn run(self) -> Result<Report, ServerError> {
        let Self {
            shutdown,
            tracker,
            servers,
            phase,
        } = self;

        let handles: Vec<(&'static str, JoinHandle<Result<Outcome, ServerError>>)> = servers
            .into_iter()
            .map(|server| {
                let name = server.name();
                let shutdown = shutdown.clone();
                let handle = tracker.spawn(async move {
                    let guard = shutdown.clone().drop_guard();
                    let result = server.start(shutdown).await;
                    if result.is_ok() {
                        let _ = guard.disarm();
                    }
                    result
                });
                (name, handle)
            })
            .collect();
        tracker.close();
        phase.send_replace(Phase::Running);
        tracing::info!(servers = handles.len(), "all servers launched");

        shutdown.cancelled().await;
        phase.send_replace(Phase::ShutdownRequested);
        tracing::info!("shutdown requested, draining servers");

        phase.send_replace(Phase::Draining);
        tracker.wait().await;
        phase.send_replace(Phase::Terminated);

        let mut report = Report::default();
        let mut failure = None;
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(outcome)) => report.outcomes.push((name, outcome)),
                Ok(Err(err)) => {
                    failure.get_or_insert(err);
                }
                Err(join) => {
                    failure.get_or_insert(ServerError::Serve {
                        server: name,
                        reason: join.to_string(),
                    });
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => {
                tracing::info!("all servers finished");
                Ok(report)
            }
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("phase", &*self.phase.borrow())
            .field("servers", &self.servers.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("cancelled", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}
