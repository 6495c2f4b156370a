//! Logging decorator for [`Greeter`].

use crate::server::service::greeting::{Greeter, Middleware};
use enki_core::{Greeting, Result};
use std::sync::Arc;
use std::time::Instant;

/// Logs every call, its outcome and how long it took. Results pass through
/// untouched.
pub struct LoggingMiddleware {
    next: Arc<dyn Greeter>,
}

impl LoggingMiddleware {
    pub fn new(next: Arc<dyn Greeter>) -> Self {
        Self { next }
    }
}

/// A [`Middleware`] that wraps its greeter in a [`LoggingMiddleware`].
#[must_use]
pub fn logging() -> Middleware {
    Box::new(|next| Arc::new(LoggingMiddleware::new(next)))
}

#[tonic::async_trait]
impl Greeter for LoggingMiddleware {
    async fn hello(&self, name: &str) -> Result<Greeting> {
        tracing::info!(rpc = "Hello", name, "call to Hello");
        let started = Instant::now();

        let result = self.next.hello(name).await;

        let took = started.elapsed();
        match &result {
            Ok(greeting) => {
                tracing::info!(rpc = "Hello", greeting = %greeting, took = ?took, "endpoint succeeded");
            }
            Err(err) => {
                tracing::info!(rpc = "Hello", error = %err, took = ?took, "endpoint failed");
            }
        }
        result
    }
}
