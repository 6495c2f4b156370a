use crate::server::service::templates::TemplateRepository;
use enki_core::{Error, Greeting, Result};
use std::sync::Arc;

/// Renders greetings.
///
/// Implementations may be the service itself or a decorator around another
/// [`Greeter`]. Decorators must forward every call and return the wrapped
/// result unchanged.
#[tonic::async_trait]
pub trait Greeter: Send + Sync {
    /// Renders a greeting for `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyName`] if `name` is empty.
    /// - [`Error::TemplateLookup`] if no template exists for `name`.
    async fn hello(&self, name: &str) -> Result<Greeting>;
}

/// Wraps a [`Greeter`] in another [`Greeter`].
pub type Middleware = Box<dyn FnOnce(Arc<dyn Greeter>) -> Arc<dyn Greeter> + Send>;

/// Applies `middlewares` around `inner`. The first middleware ends up
/// outermost and sees each call first.
pub fn chain(inner: Arc<dyn Greeter>, middlewares: Vec<Middleware>) -> Arc<dyn Greeter> {
    middlewares
        .into_iter()
        .rev()
        .fold(inner, |next, middleware| middleware(next))
}

/// The greeting implementation backed by a template repository.
#[derive(Debug, Clone)]
pub struct GreeterService<R> {
    repository: R,
}

impl<R: TemplateRepository> GreeterService<R> {
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }
}

#[tonic::async_trait]
impl<R: TemplateRepository> Greeter for GreeterService<R> {
    async fn hello(&self, name: &str) -> Result<Greeting> {
        let mut greeting = Greeting::new(name);
        greeting.validate()?;

        let template = self
            .repository
            .hello_template(&greeting.name)
            .map_err(|_| Error::TemplateLookup {
                name: greeting.name.clone(),
            })?;
        greeting.apply_template(template);

        tracing::info!(
            name = %greeting.name,
            template = %greeting.template,
            rendered = %greeting.rendered,
            "rendered greeting"
        );
        Ok(greeting)
    }
}
