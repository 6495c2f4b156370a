//! HTTP protocol server backed by an axum [`Router`].
//!
//! Requests still running when the server is forced to stop are dropped and
//! answered with `503`.

use crate::server::{error::ServerError, protocol::Protocol};
use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Server name used in logs, metrics and probe paths.
pub const NAME: &str = "http";

/// The HTTP wire protocol for a [`ProtocolServer`](super::ProtocolServer).
pub struct Http {
    router: Option<Router>,
}

impl Http {
    #[must_use]
    pub const fn new(router: Router) -> Self {
        Self {
            router: Some(router),
        }
    }
}

impl Protocol for Http {
    fn serve(
        &mut self,
        listener: TcpListener,
        stop: CancellationToken,
        force: CancellationToken,
    ) -> BoxFuture<'static, Result<(), ServerError>> {
        let router = self
            .router
            .take()
            .map(|router| router.layer(middleware::from_fn_with_state(force, force_stop)));
        Box::pin(async move {
            let router = router.ok_or_else(|| ServerError::Serve {
                server: NAME,
                reason: "serve loop already started".to_string(),
            })?;

            axum::serve(listener, router)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
                .map_err(|e| ServerError::Serve {
                    server: NAME,
                    reason: e.to_string(),
                })
        })
    }
}

async fn force_stop(State(force): State<CancellationToken>, req: Request, next: Next) -> Response {
    tokio::select! {
        biased;
        () = force.cancelled() => {
            tracing::warn!(server = NAME, "dropping in-flight request");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
        response = next.run(req) => response,
    }
}
