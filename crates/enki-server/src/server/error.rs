//! Infrastructure errors raised by the server lifecycle.
//!
//! Domain failures live in [`enki_core::Error`] and are translated to gRPC
//! statuses at the handler boundary. The variants here are the ones that stop
//! the process: a listener that cannot be bound, a serve loop that exits
//! without being asked to, or a configuration that cannot be decoded.

use std::net::SocketAddr;

/// Unified error type for server startup and lifecycle failures.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// A listener could not be opened. Never retried.
    #[error("{server} server failed to listen on {addr}: {source}")]
    Bind {
        server: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A serve loop terminated while nobody asked it to stop.
    #[error("{server} server crashed: {reason}")]
    Serve { server: &'static str, reason: String },

    /// Startup configuration could not be decoded or validated.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ServerError {
    /// Whether the error was caused by invalid startup configuration.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
