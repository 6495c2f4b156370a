//! Routes of the debug HTTP server.
//!
//! - `GET /health/{server}` for every registered probe
//! - `GET /metrics` when a Prometheus handle is attached

use crate::server::{
    health::{HealthProbe, probe_handler},
    metrics,
};
use axum::{Router, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;

/// Builder for the debug router.
#[derive(Debug, Default)]
pub struct DebugRoutes {
    probes: Vec<(&'static str, HealthProbe)>,
    metrics: Option<PrometheusHandle>,
}

impl DebugRoutes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `probe` at `/health/{server}`.
    #[must_use]
    pub fn probe(mut self, server: &'static str, probe: HealthProbe) -> Self {
        self.probes.push((server, probe));
        self
    }

    /// Mounts the Prometheus exposition at `/metrics`.
    #[must_use]
    pub fn metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn into_router(self) -> Router {
        let mut router = Router::new();
        for (server, probe) in self.probes {
            router = router.route(
                &format!("/health/{server}"),
                get(probe_handler).with_state(probe),
            );
        }
        if let Some(handle) = self.metrics {
            router = router.route("/metrics", get(metrics::render).with_state(handle));
        }
        router
    }
}
