//! Wiring of the process: both protocol servers, the debug routes and the
//! orchestrator, built from an [`AppConfig`].

use crate::server::{
    config::AppConfig,
    debug::DebugRoutes,
    error::ServerError,
    health::{HealthProbe, HealthReporter},
    lifecycle::Orchestrator,
    protocol::{
        ProtocolServer,
        grpc::{self, Grpc},
        http::{self, Http},
    },
    service::{Greeter, handler::ExampleHandler},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;

/// A fully bound application, ready to [`run`](Orchestrator::run).
#[derive(Debug)]
pub struct App {
    pub orchestrator: Orchestrator,
    pub grpc_addr: Option<SocketAddr>,
    pub http_addr: Option<SocketAddr>,
    pub grpc_health: HealthProbe,
    pub http_health: HealthProbe,
}

/// Binds every enabled server and registers it with a fresh orchestrator.
///
/// Health probes are only reachable over HTTP when the debug server is
/// enabled; the gRPC server always answers `grpc.health.v1` itself.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] for the first listener that cannot be
/// acquired. Nothing has been launched at that point.
pub async fn build(
    config: &AppConfig,
    greeter: Arc<dyn Greeter>,
    metrics: Option<PrometheusHandle>,
) -> Result<App, ServerError> {
    let mut orchestrator = Orchestrator::new();
    let shutdown = orchestrator.shutdown_token();

    let grpc_health = HealthReporter::new(grpc::NAME);
    let http_health = HealthReporter::new(http::NAME);
    let grpc_probe = grpc_health.probe();
    let http_probe = http_health.probe();

    let mut routes = DebugRoutes::new();
    if config.grpc.is_enabled() {
        routes = routes.probe(grpc::NAME, grpc_probe.clone());
    }
    routes = routes.probe(http::NAME, http_probe.clone());
    if let Some(handle) = metrics {
        routes = routes.metrics(handle);
    }
    if config.grpc.is_enabled() && !config.http.is_enabled() {
        tracing::info!("debug HTTP server disabled, gRPC health is only served via grpc.health.v1");
    }

    let handler = ExampleHandler::new(greeter, shutdown);
    let grpc = ProtocolServer::bind(
        grpc::NAME,
        config.grpc,
        grpc_health,
        Grpc::new(handler).await,
    )
    .await?;
    let http = ProtocolServer::bind(
        http::NAME,
        config.http,
        http_health,
        Http::new(routes.into_router()),
    )
    .await?;

    let grpc_addr = grpc.local_addr();
    let http_addr = http.local_addr();
    orchestrator.register(grpc).register(http);

    Ok(App {
        orchestrator,
        grpc_addr,
        http_addr,
        grpc_health: grpc_probe,
        http_health: http_probe,
    })
}
