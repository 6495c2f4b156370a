//! # Telemetry
//!
//! Log events are always written to the console through
//! `tracing_subscriber::fmt`, filtered by `--log-level` (or `RUST_LOG` when
//! set). Span export through OpenTelemetry is opt-in.
//!
//! ## Feature matrix
//!
//! - `otel`: Enables OpenTelemetry distributed tracing (via spans).
//! - `stdout`: Exports spans to stdout.
//! - `otlp`: Exports spans over OTLP/gRPC. The endpoint is read from the
//!   standard `OTEL_EXPORTER_OTLP_ENDPOINT` variable.
//!
//! ## Feature constraints
//!
//! - Exporters require `otel`.
//! - Both exporters can be enabled at the same time.
//!
//! ## Example usage
//!
//! ```bash
//! cargo run --features otel,stdout
//! ```

// Disallow exporters without `otel`
#[cfg(all(any(feature = "stdout", feature = "otlp"), not(feature = "otel")))]
compile_error!("The 'stdout' and 'otlp' features require the 'otel' feature to be enabled.");

use crate::server::config::LogLevel;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "otel")]
use opentelemetry::{InstrumentationScope, KeyValue, trace::TracerProvider};
#[cfg(feature = "otel")]
use opentelemetry_sdk::{Resource, propagation::TraceContextPropagator, trace as sdktrace};
#[cfg(feature = "otel")]
use opentelemetry_semantic_conventions as semvcns;

/// Handles that must outlive the servers and be flushed on exit.
#[allow(missing_debug_implementations)]
pub struct TelemetryProviders {
    #[cfg(feature = "otel")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down exporters. Errors are printed, not returned,
    /// since logging may already be gone at this point.
    #[allow(clippy::print_stderr, clippy::unused_self)]
    pub fn shutdown(self) {
        #[cfg(feature = "otel")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed or an exporter cannot be
/// built.
pub fn init_telemetry(log_level: LogLevel) -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "otel")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "otel")]
    let tracer_provider = init_tracer()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_directive()));

    let registry = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_line_number(true)
            .with_target(false)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
            .with_file(true)
            .pretty(),
    );

    #[cfg(feature = "otel")]
    let registry = {
        let scope = InstrumentationScope::builder(env!("CARGO_PKG_NAME"))
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semvcns::SCHEMA_URL)
            .build();
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope))
                .with_error_records_to_exceptions(true),
        )
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "otel")]
        tracer_provider,
    })
}

#[cfg(feature = "otel")]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(env!("CARGO_PKG_NAME"))
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "otel")]
fn init_tracer() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let exporter = opentelemetry_stdout::SpanExporter::default();
        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(std::time::Duration::from_secs(5))
                    .with_max_queue_size(2048)
                    .build(),
            )
            .build();
        builder.with_span_processor(batch)
    };

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .build()
            .context("failed to build OTLP span exporter")?;
        builder.with_batch_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installs_console_subscriber_once() {
        let providers = init_telemetry(LogLevel::Debug).unwrap();
        tracing::debug!(server = "grpc", "subscriber installed");
        assert!(init_telemetry(LogLevel::Info).is_err());
        providers.shutdown();
    }
}
