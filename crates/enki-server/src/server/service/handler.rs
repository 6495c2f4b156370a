//! gRPC entry point for the greeting service.
//!
//! [`ExampleHandler`] implements the generated [`ExampleService`] trait over
//! an opaque [`Greeter`]. Domain errors are translated into gRPC statuses at
//! this boundary and never affect other in-flight calls.

use crate::server::{metrics, service::greeting::Greeter};
use enki_core::{
    Error,
    proto::{HelloRequest, HelloResponse, example_service_server::ExampleService},
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

/// gRPC handler for `example.ExampleService`.
#[derive(Clone)]
pub struct ExampleHandler {
    greeter: Arc<dyn Greeter>,
    shutdown: CancellationToken,
}

impl ExampleHandler {
    /// Serves `greeter`. Calls that arrive after `shutdown` fired are
    /// rejected with `UNAVAILABLE`; calls already running finish normally.
    pub fn new(greeter: Arc<dyn Greeter>, shutdown: CancellationToken) -> Self {
        Self { greeter, shutdown }
    }
}

#[tonic::async_trait]
impl ExampleService for ExampleHandler {
    #[tracing::instrument(skip_all, fields(name = %req.get_ref().name))]
    async fn hello(&self, req: Request<HelloRequest>) -> Result<Response<HelloResponse>, Status> {
        let start = Instant::now();
        if self.shutdown.is_cancelled() {
            metrics::record_rpc("Hello", false, start.elapsed());
            return Err(Error::ServiceShutdown.into());
        }

        let result = self.greeter.hello(&req.get_ref().name).await;
        metrics::record_rpc("Hello", result.is_ok(), start.elapsed());

        let greeting = result?;
        Ok(Response::new(HelloResponse {
            greeting: greeting.rendered,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::service::{GreeterService, templates::StaticTemplates};
    use tonic::Code;

    fn handler(shutdown: CancellationToken) -> ExampleHandler {
        ExampleHandler::new(
            Arc::new(GreeterService::new(StaticTemplates::default())),
            shutdown,
        )
    }

    fn request(name: &str) -> Request<HelloRequest> {
        Request::new(HelloRequest {
            name: name.to_string(),
        })
    }

    #[tokio::test]
    async fn hello_renders_greeting() {
        let response = handler(CancellationToken::new())
            .hello(request("Ferris"))
            .await
            .unwrap();
        assert_eq!(response.get_ref().greeting, "Hello, Ferris!");
    }

    #[tokio::test]
    async fn empty_name_is_invalid_argument() {
        let status = handler(CancellationToken::new())
            .hello(request(""))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn calls_after_shutdown_are_unavailable() {
        let shutdown = CancellationToken::new();
        let handler = handler(shutdown.clone());
        shutdown.cancel();

        let status = handler.hello(request("Ferris")).await.unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }
}
