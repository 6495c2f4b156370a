#![doc = include_str!("../README.md")]

mod common;
pub use common::*;

/// gRPC bindings for the `example.ExampleService`.
///
/// ## Service
///
/// - `Hello` - renders a greeting for the supplied name.
///
/// ## Messages
///
/// - [`HelloRequest`](proto::HelloRequest) - carries the `name` to greet.
/// - [`HelloResponse`](proto::HelloResponse) - carries the rendered
///   `greeting`.
///
/// The server trait lives in [`example_service_server`](proto::example_service_server),
/// the client in [`example_service_client`](proto::example_service_client).
pub mod proto {
    /// Request message for `ExampleService.Hello`.
    #[derive(Clone, PartialEq, Eq, Hash, prost::Message)]
    pub struct HelloRequest {
        /// Name to greet. Must not be empty.
        #[prost(string, tag = "1")]
        pub name: String,
    }

    /// Response message for `ExampleService.Hello`.
    #[derive(Clone, PartialEq, Eq, Hash, prost::Message)]
    pub struct HelloResponse {
        /// The rendered greeting.
        #[prost(string, tag = "1")]
        pub greeting: String,
    }

    include!(concat!(env!("OUT_DIR"), "/example.ExampleService.rs"));
}
