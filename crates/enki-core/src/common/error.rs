//! Error types for the greeting domain.
//!
//! This module defines the central `Error` enum for failures that are
//! surfaced to RPC callers. It implements `From<Error>` for `tonic::Status`
//! so handlers can propagate domain failures with `?` and have them mapped to
//! the matching gRPC status code without affecting other in-flight requests.
//!
//! ## Error Cases
//! - `EmptyName`: the request carried an empty name.
//! - `TemplateLookup`: no greeting template could be resolved for the name.
//! - `ServiceShutdown`: a request arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the greeting service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The greeting has no name to render.
    #[error("greeting.name cannot be empty")]
    EmptyName,

    /// The template repository had no template for the name.
    #[error("cannot get hello template for name {name:?}")]
    TemplateLookup { name: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::EmptyName => Self::invalid_argument(err.to_string()),
            Error::TemplateLookup { .. } => Self::not_found(err.to_string()),
            Error::ServiceShutdown => Self::unavailable("Service is shutting down"),
        }
    }
}
