//! Per-server health flag.
//!
//! A [`HealthReporter`] is the single writer of a server's readiness flag and
//! is owned by that server's lifecycle. Any number of [`HealthProbe`]s can be
//! handed out to readers such as the debug HTTP endpoint. Readers only need
//! eventual visibility, so the flag is a plain atomic.

use crate::server::metrics;
use axum::{extract::State, http::StatusCode};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Probe body reported while the server is ready.
pub const HEALTHY: &str = "OK";
/// Probe body reported before serving and after shutdown was requested.
pub const UNHEALTHY: &str = "UNHEALTHY";

/// Write side of a health flag. There is one writer per server.
#[derive(Debug)]
pub struct HealthReporter {
    server: &'static str,
    flag: Arc<AtomicBool>,
}

/// Read side of a health flag.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    flag: Arc<AtomicBool>,
}

impl HealthReporter {
    /// Creates an unhealthy flag for `server`.
    #[must_use]
    pub fn new(server: &'static str) -> Self {
        Self {
            server,
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a reader for this flag.
    #[must_use]
    pub fn probe(&self) -> HealthProbe {
        HealthProbe {
            flag: Arc::clone(&self.flag),
        }
    }

    pub fn set_serving(&self) {
        self.set(true);
    }

    pub fn set_not_serving(&self) {
        self.set(false);
    }

    fn set(&self, healthy: bool) {
        self.flag.store(healthy, Ordering::SeqCst);
        metrics::set_server_healthy(self.server, healthy);
        tracing::debug!(server = self.server, healthy, "health changed");
    }
}

impl HealthProbe {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The probe body for the current state.
    #[must_use]
    pub fn status(&self) -> &'static str {
        if self.is_healthy() { HEALTHY } else { UNHEALTHY }
    }
}

/// Axum handler for a health probe.
///
/// Always answers `200`. The verdict is carried in the body.
pub async fn probe_handler(State(probe): State<HealthProbe>) -> (StatusCode, &'static str) {
    (StatusCode::OK, probe.status())
}
