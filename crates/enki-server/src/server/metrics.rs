//! Prometheus metrics.
//!
//! Metrics are recorded through the [`metrics`] facade. Until a recorder is
//! installed every helper below is a no-op, which keeps unit tests free of
//! global state. The binary installs a Prometheus recorder at startup and
//! mounts the returned [`PrometheusHandle`] on the debug HTTP server.
//!
//! ## Series
//!
//! - `enki_rpc_requests_total{method,outcome}` (counter)
//! - `enki_rpc_request_duration_seconds{method}` (histogram)
//! - `enki_server_healthy{server}` (gauge, 1 or 0)
//! - `enki_server_shutdowns_total{server,outcome}` (counter)

use axum::extract::State;
use core::time::Duration;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tokio_util::sync::CancellationToken;

/// How often histogram buckets are drained when no HTTP exporter owns the
/// recorder.
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

const RPC_REQUESTS: &str = "enki_rpc_requests_total";
const RPC_DURATION: &str = "enki_rpc_request_duration_seconds";
const SERVER_HEALTHY: &str = "enki_server_healthy";
const SERVER_SHUTDOWNS: &str = "enki_server_shutdowns_total";

/// Installs the process-wide Prometheus recorder.
///
/// # Errors
///
/// Fails if a recorder has already been installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    metrics::describe_counter!(RPC_REQUESTS, "Total RPC calls by method and outcome");
    metrics::describe_histogram!(
        RPC_DURATION,
        metrics::Unit::Seconds,
        "End-to-end RPC handler duration"
    );
    metrics::describe_gauge!(SERVER_HEALTHY, "Health flag per protocol server");
    metrics::describe_counter!(SERVER_SHUTDOWNS, "Shutdowns per protocol server and outcome");
    Ok(handle)
}

/// Runs recorder upkeep until `stop` is cancelled.
pub fn spawn_upkeep(handle: PrometheusHandle, stop: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPKEEP_INTERVAL);
        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = interval.tick() => handle.run_upkeep(),
            }
        }
    })
}

/// Axum handler rendering the text exposition.
pub async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

pub fn record_rpc(method: &'static str, ok: bool, elapsed: Duration) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!(RPC_REQUESTS, "method" => method, "outcome" => outcome).increment(1);
    metrics::histogram!(RPC_DURATION, "method" => method).record(elapsed.as_secs_f64());
}

pub fn set_server_healthy(server: &'static str, healthy: bool) {
    metrics::gauge!(SERVER_HEALTHY, "server" => server).set(if healthy { 1.0 } else { 0.0 });
}

pub fn increment_shutdowns(server: &'static str, outcome: &'static str) {
    metrics::counter!(SERVER_SHUTDOWNS, "server" => server, "outcome" => outcome).increment(1);
}
