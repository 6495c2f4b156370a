//! Server lifecycle, protocol servers and the greeting service.
//!
//! ## Structure
//!
//! - [`config`] - CLI/env configuration.
//! - [`telemetry`] - tracing subscriber and optional OpenTelemetry export.
//! - [`metrics`] - Prometheus metrics.
//! - [`listener`] - TCP listener binding.
//! - [`health`] - per-server health flags and probe handler.
//! - [`protocol`] - the shared protocol server lifecycle and its gRPC and
//!   HTTP variants.
//! - [`lifecycle`] - the orchestrator.
//! - [`signal`] - OS signal to cancellation bridge.
//! - [`debug`] - debug HTTP routes.
//! - [`service`] - the greeting service and its gRPC handler.
//! - [`app`] - process wiring.

pub mod app;
pub mod config;
pub mod debug;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod listener;
pub mod metrics;
pub mod protocol;
pub mod service;
pub mod signal;
pub mod telemetry;
