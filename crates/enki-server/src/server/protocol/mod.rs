//! Protocol servers and their shared lifecycle.
//!
//! A [`ProtocolServer`] owns one bound listener, one [`ServerConfig`] and the
//! write side of one health flag. The wire protocol itself is supplied by a
//! [`Protocol`] implementation ([`grpc::Grpc`] or [`http::Http`]); everything
//! else is shared:
//!
//! ```text
//! constructed ──start──► serving ──cancel──► shutdown-requested ──┬──► stopped
//!  (bound)              health=true          health=false         └──► forced-stopped
//! ```
//!
//! Once the shared cancellation token fires, health is flipped to false
//! *before* the serve loop is told to stop accepting, and the graceful drain
//! is raced against the configured grace period. If the deadline wins, the
//! server's `force` token is cancelled, which drops every in-flight handler
//! of this server, and the serve loop is aborted if it still has not exited
//! shortly after. Sibling servers are unaffected.
//!
//! A server whose config carries no address is disabled: it binds nothing and
//! its `start` completes immediately.

pub mod grpc;
pub mod http;

use crate::server::{
    config::ServerConfig,
    error::ServerError,
    health::{HealthProbe, HealthReporter},
    listener, metrics,
};
use core::{fmt, time::Duration};
use futures::future::BoxFuture;
use std::net::SocketAddr;
use tokio::{net::TcpListener, task::JoinError};
use tokio_util::sync::CancellationToken;

/// How long an abandoned serve loop may take to close its connections before
/// it is aborted.
const ABANDON_WAIT: Duration = Duration::from_millis(100);

/// A wire protocol that can serve a bound listener until told to stop.
pub trait Protocol: Send + Sync + 'static {
    /// Builds the serve loop for `listener`.
    ///
    /// The returned future must stop accepting connections once `stop` is
    /// cancelled and resolve after in-flight requests have drained. Once
    /// `force` is cancelled, in-flight requests must be abandoned without
    /// running to completion. It is polled on its own task. Called at most
    /// once per server.
    fn serve(
        &mut self,
        listener: TcpListener,
        stop: CancellationToken,
        force: CancellationToken,
    ) -> BoxFuture<'static, Result<(), ServerError>>;

    /// Invoked right after the serve loop has been spawned.
    fn serving(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    /// Invoked once shutdown was requested, before the serve loop is stopped.
    fn not_serving(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// How a server's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The server had no address and never ran.
    Disabled,
    /// In-flight requests drained within the grace period.
    Stopped,
    /// The grace period elapsed and outstanding requests were abandoned.
    ForcedStopped,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Stopped => "stopped",
            Self::ForcedStopped => "forced_stopped",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol server driven by a shared cancellation token.
pub struct ProtocolServer<P> {
    name: &'static str,
    config: ServerConfig,
    listener: Option<TcpListener>,
    health: HealthReporter,
    protocol: P,
}

impl<P: Protocol> ProtocolServer<P> {
    /// Constructs the server and binds its listener.
    ///
    /// Disabled configs skip binding entirely.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the listener cannot be acquired. The
    /// caller is expected to abort startup.
    pub async fn bind(
        name: &'static str,
        config: ServerConfig,
        health: HealthReporter,
        protocol: P,
    ) -> Result<Self, ServerError> {
        let listener = match config.addr {
            Some(addr) => Some(listener::bind(name, addr).await?),
            None => None,
        };
        Ok(Self {
            name,
            config,
            listener,
            health,
            protocol,
        })
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The address actually bound, which differs from the configured one for
    /// port `0`.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// A reader for this server's health flag.
    #[must_use]
    pub fn health(&self) -> HealthProbe {
        self.health.probe()
    }

    /// Serves until `shutdown` is cancelled, then shuts down within the grace
    /// period.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serve`] if the serve loop exits or panics before
    /// shutdown was requested.
    pub async fn start(mut self, shutdown: CancellationToken) -> Result<Outcome, ServerError> {
        let name = self.name;
        let Some(listener) = self.listener.take() else {
            tracing::info!(server = name, "server disabled, no port configured");
            return Ok(Outcome::Disabled);
        };
        let addr = listener.local_addr().ok();

        let stop = CancellationToken::new();
        let force = CancellationToken::new();
        let mut serve_loop =
            tokio::spawn(self.protocol.serve(listener, stop.clone(), force.clone()));
        self.health.set_serving();
        self.protocol.serving().await;
        tracing::info!(server = name, addr = ?addr, "server running");

        tokio::select! {
            biased;
            () = shutdown.cancelled() => {}
            result = &mut serve_loop => {
                self.health.set_not_serving();
                self.protocol.not_serving().await;
                let err = unexpected_exit(name, result);
                tracing::error!(server = name, error = %err, "server crashed");
                return Err(err);
            }
        }

        tracing::info!(server = name, "server shutdown requested");
        self.health.set_not_serving();
        self.protocol.not_serving().await;
        stop.cancel();

        let grace_period = self.config.grace_period;
        let outcome = tokio::select! {
            biased;
            result = &mut serve_loop => {
                if let Err(err) = flatten(name, result) {
                    tracing::warn!(server = name, error = %err, "server reported an error while draining");
                }
                tracing::info!(server = name, "server stopped");
                Outcome::Stopped
            }
            () = tokio::time::sleep(grace_period) => {
                tracing::warn!(
                    server = name,
                    grace_period = ?grace_period,
                    "server graceful shutdown timed out, dropping in-flight requests"
                );
                force.cancel();
                if tokio::time::timeout(ABANDON_WAIT, &mut serve_loop).await.is_err() {
                    serve_loop.abort();
                    let _ = serve_loop.await;
                }
                Outcome::ForcedStopped
            }
        };

        metrics::increment_shutdowns(name, outcome.as_str());
        Ok(outcome)
    }
}

impl<P> fmt::Debug for ProtocolServer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolServer")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("bound", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

fn flatten(
    name: &'static str,
    result: Result<Result<(), ServerError>, JoinError>,
) -> Result<(), ServerError> {
    match result {
        Ok(inner) => inner,
        Err(join) => Err(ServerError::Serve {
            server: name,
            reason: join.to_string(),
        }),
    }
}

/// Any serve loop exit before shutdown is a crash, even a clean one.
fn unexpected_exit(
    name: &'static str,
    result: Result<Result<(), ServerError>, JoinError>,
) -> ServerError {
    flatten(name, result).err().unwrap_or_else(|| ServerError::Serve {
        server: name,
        reason: "serve loop exited before shutdown was requested".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::health::{HEALTHY, UNHEALTHY};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    /// Serves nothing; drains after `drain` once stopped, or fails on demand.
    struct Scripted {
        drain: Duration,
        crash_after: Option<Duration>,
    }

    impl Protocol for Scripted {
        fn serve(
            &mut self,
            _listener: TcpListener,
            stop: CancellationToken,
            force: CancellationToken,
        ) -> BoxFuture<'static, Result<(), ServerError>> {
            let drain = self.drain;
            let crash_after = self.crash_after;
            Box::pin(async move {
                if let Some(after) = crash_after {
                    tokio::time::sleep(after).await;
                    return Err(ServerError::Serve {
                        server: "scripted",
                        reason: "boom".into(),
                    });
                }
                stop.cancelled().await;
                tokio::select! {
                    () = tokio::time::sleep(drain) => {}
                    () = force.cancelled() => {}
                }
                Ok(())
            })
        }
    }

    /// Records the health flag at the moment it is told to stop.
    struct Observing {
        probe: HealthProbe,
        healthy_at_stop: Arc<AtomicBool>,
    }

    impl Protocol for Observing {
        fn serve(
            &mut self,
            _listener: TcpListener,
            stop: CancellationToken,
            _force: CancellationToken,
        ) -> BoxFuture<'static, Result<(), ServerError>> {
            let probe = self.probe.clone();
            let healthy_at_stop = Arc::clone(&self.healthy_at_stop);
            Box::pin(async move {
                stop.cancelled().await;
                healthy_at_stop.store(probe.is_healthy(), Ordering::SeqCst);
                Ok(())
            })
        }
    }

    /// A serve loop that finishes from inside the `not_serving` hook, so it
    /// has already exited when the drain race begins.
    struct Drained {
        done: CancellationToken,
    }

    impl Protocol for Drained {
        fn serve(
            &mut self,
            _listener: TcpListener,
            _stop: CancellationToken,
            _force: CancellationToken,
        ) -> BoxFuture<'static, Result<(), ServerError>> {
            let done = self.done.clone();
            Box::pin(async move {
                done.cancelled().await;
                Ok(())
            })
        }

        fn not_serving(&self) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                self.done.cancel();
                tokio::time::sleep(Duration::from_millis(50)).await;
            })
        }
    }

    async fn scripted(
        config: ServerConfig,
        drain: Duration,
        crash_after: Option<Duration>,
    ) -> ProtocolServer<Scripted> {
        ProtocolServer::bind(
            "scripted",
            config,
            HealthReporter::new("scripted"),
            Scripted { drain, crash_after },
        )
        .await
        .unwrap()
    }

    fn local(grace: Duration) -> ServerConfig {
        ServerConfig::enabled("127.0.0.1:0".parse().unwrap(), grace)
    }

    #[tokio::test]
    async fn disabled_server_completes_immediately_without_binding() {
        let server = scripted(ServerConfig::disabled(), Duration::ZERO, None).await;
        assert!(server.local_addr().is_none());
        let probe = server.health();

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            server.start(CancellationToken::new()),
        )
        .await
        .expect("disabled server must not block");
        assert_eq!(outcome.unwrap(), Outcome::Disabled);
        assert_eq!(probe.status(), UNHEALTHY);
    }

    #[tokio::test]
    async fn healthy_while_serving_then_stops_within_grace() {
        let server = scripted(local(Duration::from_secs(2)), Duration::from_millis(50), None).await;
        assert!(server.local_addr().is_some());
        let probe = server.health();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.start(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(probe.status(), HEALTHY);

        shutdown.cancel();
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, Outcome::Stopped);
        assert_eq!(probe.status(), UNHEALTHY);
    }

    #[tokio::test]
    async fn slow_drain_is_forced_after_grace_period() {
        let grace = Duration::from_millis(200);
        let server = scripted(local(grace), Duration::from_secs(30), None).await;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.start(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        shutdown.cancel();
        let outcome = task.await.unwrap().unwrap();
        let took = started.elapsed();

        assert_eq!(outcome, Outcome::ForcedStopped);
        assert!(took >= grace, "returned before the grace period: {took:?}");
        assert!(
            took < grace + Duration::from_secs(1),
            "in-flight work was not abandoned: {took:?}"
        );
    }

    #[tokio::test]
    async fn health_is_false_before_serve_loop_is_stopped() {
        let health = HealthReporter::new("observing");
        let probe = health.probe();
        let healthy_at_stop = Arc::new(AtomicBool::new(true));
        let server = ProtocolServer::bind(
            "observing",
            local(Duration::from_secs(1)),
            health,
            Observing {
                probe: probe.clone(),
                healthy_at_stop: Arc::clone(&healthy_at_stop),
            },
        )
        .await
        .unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.start(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(probe.is_healthy());

        shutdown.cancel();
        assert_eq!(task.await.unwrap().unwrap(), Outcome::Stopped);
        assert!(!healthy_at_stop.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn drained_loop_wins_over_zero_grace() {
        let server = ProtocolServer::bind(
            "drained",
            local(Duration::ZERO),
            HealthReporter::new("drained"),
            Drained {
                done: CancellationToken::new(),
            },
        )
        .await
        .unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.start(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;

        shutdown.cancel();
        assert_eq!(task.await.unwrap().unwrap(), Outcome::Stopped);
    }

    #[tokio::test]
    async fn serve_loop_crash_is_reported() {
        let server = scripted(
            local(Duration::from_secs(1)),
            Duration::ZERO,
            Some(Duration::from_millis(20)),
        )
        .await;
        let probe = server.health();

        let err = server.start(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ServerError::Serve { .. }));
        assert_eq!(probe.status(), UNHEALTHY);
    }

    #[tokio::test]
    async fn bind_failure_surfaces_from_construction() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig::enabled(taken.local_addr().unwrap(), Duration::ZERO);

        let err = ProtocolServer::bind(
            "scripted",
            config,
            HealthReporter::new("scripted"),
            Scripted {
                drain: Duration::ZERO,
                crash_after: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
