//! Domain model and error types shared between server and clients.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::Greeting;
