/// Generates the gRPC client and server bindings for the `ExampleService`.
///
/// The service is declared with `tonic-build`'s manual builder rather than
/// compiled from a `.proto` file, so building the crate does not require a
/// `protoc` installation. The request and response messages are hand-written
/// `prost` messages living in `crate::proto` and are carried over the wire
/// with `tonic_prost::ProstCodec`, which keeps the encoding byte-compatible
/// with the equivalent protobuf schema:
///
/// ```proto
/// syntax = "proto3";
/// package example;
///
/// service ExampleService {
///   rpc Hello(HelloRequest) returns (HelloResponse);
/// }
///
/// message HelloRequest { string name = 1; }
/// message HelloResponse { string greeting = 1; }
/// ```
///
/// # Output
///
/// Generated code lands in `OUT_DIR/example.ExampleService.rs` and is pulled in
/// by `crate::proto`.
fn main() {
    let hello = tonic_build::manual::Method::builder()
        .name("hello")
        .route_name("Hello")
        .input_type("crate::proto::HelloRequest")
        .output_type("crate::proto::HelloResponse")
        .codec_path("tonic_prost::ProstCodec")
        .build();

    let service = tonic_build::manual::Service::builder()
        .name("ExampleService")
        .package("example")
        .method(hello)
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);
}
