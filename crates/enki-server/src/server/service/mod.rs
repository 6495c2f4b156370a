//! The greeting service registered on the gRPC server.
//!
//! The protocol server only ever sees an opaque [`Greeter`]. Whether that is
//! the plain [`GreeterService`] or a chain of decorators around it is decided
//! once at construction time with [`chain`].
//!
//! ## Structure
//!
//! - [`greeting`] - the [`Greeter`] capability, its implementation and the
//!   middleware chain.
//! - [`templates`] - template repositories.
//! - [`logging`] - call/outcome/duration logging decorator.
//! - [`handler`] - gRPC entry point (`ExampleHandler`).

pub mod greeting;
pub mod handler;
pub mod logging;
pub mod templates;

pub use greeting::{Greeter, GreeterService, Middleware, chain};
