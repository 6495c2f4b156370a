//! gRPC protocol server.
//!
//! Serves the [`ExampleService`](enki_core::proto::example_service_server)
//! alongside the standard `grpc.health.v1.Health` service. The tonic health
//! status mirrors the server's own health flag: `SERVING` once the serve loop
//! is up, `NOT_SERVING` as soon as shutdown is requested.
//!
//! HTTP/1 is accepted so that gRPC-Web clients can talk to the server through
//! the permissive CORS layer.
//!
//! Every call races the server's `force` token through [`ForceStopLayer`].
//! When the grace period runs out the handler future is dropped and the
//! caller receives `UNAVAILABLE`.

use crate::server::{error::ServerError, protocol::Protocol, service::handler::ExampleHandler};
use core::task::{Context, Poll};
use enki_core::proto::example_service_server::ExampleServiceServer;
use futures::future::BoxFuture;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::{
    Status,
    codec::CompressionEncoding,
    codegen::http::{Request, Response},
    service::Routes,
    transport::Server,
};
use tonic_health::{ServingStatus, server::HealthReporter};
use tonic_web::GrpcWebLayer;
use tower::{Layer, Service, ServiceBuilder};
use tower_http::cors::{Any, CorsLayer};

/// Server name used in logs, metrics and probe paths.
pub const NAME: &str = "grpc";

/// The gRPC wire protocol for a [`ProtocolServer`](super::ProtocolServer).
pub struct Grpc {
    routes: Option<Routes>,
    health_reporter: HealthReporter,
}

impl Grpc {
    /// Registers `handler` and the health service. Both report
    /// `NOT_SERVING` until the server starts.
    pub async fn new(handler: ExampleHandler) -> Self {
        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_not_serving::<ExampleServiceServer<ExampleHandler>>()
            .await;
        health_reporter
            .set_service_status("", ServingStatus::NotServing)
            .await;

        let mut routes = Routes::builder();
        routes
            .add_service(health_service)
            .add_service(build_example_service(handler));

        Self {
            routes: Some(routes.routes()),
            health_reporter,
        }
    }
}

impl Protocol for Grpc {
    fn serve(
        &mut self,
        listener: TcpListener,
        stop: CancellationToken,
        force: CancellationToken,
    ) -> BoxFuture<'static, Result<(), ServerError>> {
        let routes = self.routes.take();
        Box::pin(async move {
            let routes = routes.ok_or_else(|| ServerError::Serve {
                server: NAME,
                reason: "serve loop already started".to_string(),
            })?;

            Server::builder()
                .accept_http1(true)
                .http2_adaptive_window(Some(true))
                .layer(
                    ServiceBuilder::new()
                        .layer(
                            CorsLayer::new()
                                .allow_origin(Any)
                                .allow_methods(Any)
                                .allow_headers(Any),
                        )
                        .layer(GrpcWebLayer::new())
                        .layer(ForceStopLayer::new(force)),
                )
                .add_routes(routes)
                .serve_with_incoming_shutdown(
                    TcpListenerStream::new(listener),
                    stop.cancelled_owned(),
                )
                .await
                .map_err(|e| ServerError::Serve {
                    server: NAME,
                    reason: e.to_string(),
                })
        })
    }

    fn serving(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.health_reporter
                .set_serving::<ExampleServiceServer<ExampleHandler>>()
                .await;
            self.health_reporter
                .set_service_status("", ServingStatus::Serving)
                .await;
        })
    }

    fn not_serving(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.health_reporter
                .set_not_serving::<ExampleServiceServer<ExampleHandler>>()
                .await;
            self.health_reporter
                .set_service_status("", ServingStatus::NotServing)
                .await;
        })
    }
}

/// Drops in-flight calls once `force` is cancelled.
#[derive(Debug, Clone)]
pub struct ForceStopLayer {
    force: CancellationToken,
}

impl ForceStopLayer {
    #[must_use]
    pub const fn new(force: CancellationToken) -> Self {
        Self { force }
    }
}

impl<S> Layer<S> for ForceStopLayer {
    type Service = ForceStop<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ForceStop {
            inner,
            force: self.force.clone(),
        }
    }
}

/// Service produced by [`ForceStopLayer`].
#[derive(Debug, Clone)]
pub struct ForceStop<S> {
    inner: S,
    force: CancellationToken,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ForceStop<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    ResBody: Default,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let call = self.inner.call(req);
        let force = self.force.clone();
        Box::pin(async move {
            tokio::select! {
                biased;
                () = force.cancelled() => {
                    tracing::warn!(server = NAME, "dropping in-flight call");
                    Ok(Status::unavailable("server stopped before the call completed").into_http())
                }
                response = call => response,
            }
        })
    }
}

fn build_example_service(handler: ExampleHandler) -> ExampleServiceServer<ExampleHandler> {
    ExampleServiceServer::new(handler)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::{convert::Infallible, time::Duration};
    use tower::{ServiceExt, service_fn};

    async fn late(delay: Duration) -> Result<Response<String>, Infallible> {
        tokio::time::sleep(delay).await;
        Ok(Response::new("late".to_string()))
    }

    #[tokio::test]
    async fn calls_pass_through_until_forced() {
        let force = CancellationToken::new();
        let service = ForceStopLayer::new(force)
            .layer(service_fn(|_req: Request<()>| late(Duration::ZERO)));

        let response = service.oneshot(Request::new(())).await.unwrap();
        assert_eq!(response.body(), "late");
    }

    #[tokio::test]
    async fn forced_call_is_dropped_with_unavailable() {
        let force = CancellationToken::new();
        let service = ForceStopLayer::new(force.clone())
            .layer(service_fn(|_req: Request<()>| late(Duration::from_secs(30))));
        let call = tokio::spawn(service.oneshot(Request::new(())));
        tokio::time::sleep(Duration::from_millis(20)).await;

        force.cancel();
        let response = tokio::time::timeout(Duration::from_secs(1), call)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(response.body().is_empty());
        assert_eq!(response.headers()["grpc-status"], "14");
    }
}
