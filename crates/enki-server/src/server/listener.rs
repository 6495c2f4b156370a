//! Passive TCP listener acquisition.
//!
//! Binding is attempted exactly once. Port conflicts, missing permissions and
//! unusable addresses are configuration mistakes, so the error is returned to
//! the caller unchanged and startup is aborted.

use crate::server::error::ServerError;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Binds a TCP listener for the named protocol server.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address cannot be acquired.
pub async fn bind(server: &'static str, addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            server,
            addr,
            source,
        })?;

    tracing::debug!(
        server,
        addr = %listener.local_addr().unwrap_or(addr),
        "listener bound"
    );
    Ok(listener)
}
