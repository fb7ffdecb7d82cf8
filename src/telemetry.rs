//! Tracing subscriber setup with optional OTLP export

use anyhow::{Context, Result};
use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::config::LoggingConfig;

const SERVICE_NAME: &str = "fieldsense";

/// Keeps exporters alive; flushes them when dropped
#[derive(Default)]
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
    logger_provider: Option<SdkLoggerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to flush trace exporter: {e}");
            }
        }
        if let Some(provider) = self.logger_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to flush log exporter: {e}");
            }
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(logging: &LoggingConfig, verbose: bool) -> Result<TelemetryGuard> {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fieldsense={default_level},tower_http={default_level}")));

    let fmt_layer = match logging.format.as_str() {
        "json" => fmt::layer().json().with_target(true).boxed(),
        _ => fmt::layer().with_target(true).boxed(),
    };

    let mut guard = TelemetryGuard::default();
    let (trace_layer, log_layer) = match &logging.otlp_endpoint {
        Some(endpoint) => {
            let endpoint = endpoint.trim_end_matches('/');
            let tracer_provider = tracer_provider(endpoint)?;
            let logger_provider = logger_provider(endpoint)?;

            let trace_layer = tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer(SERVICE_NAME));
            let log_layer = OpenTelemetryTracingBridge::new(&logger_provider);

            guard.tracer_provider = Some(tracer_provider);
            guard.logger_provider = Some(logger_provider);
            (Some(trace_layer), Some(log_layer))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .with(trace_layer)
        .with(log_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(endpoint) = &logging.otlp_endpoint {
        tracing::info!(endpoint, "Exporting traces and logs over OTLP");
    }
    Ok(guard)
}

fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attribute(KeyValue::new(SERVICE_VERSION, crate::VERSION))
        .build()
}

fn tracer_provider(endpoint: &str) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(format!("{endpoint}/v1/traces"))
        .build()
        .context("Failed to build OTLP span exporter")?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}

fn logger_provider(endpoint: &str) -> Result<SdkLoggerProvider> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_http()
        .with_endpoint(format!("{endpoint}/v1/logs"))
        .build()
        .context("Failed to build OTLP log exporter")?;

    Ok(SdkLoggerProvider::builder()
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}
