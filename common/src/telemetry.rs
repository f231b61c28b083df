// Telemetry module for structured logging, metrics, and tracing

use crate::errors::ExecutionError;
use crate::models::{CompletionOutcome, ScheduleKind};
use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging with JSON formatting and trace context
///
/// Log levels come from the environment (`RUST_LOG`) or the configured
/// default; when an OTLP endpoint is configured, spans are exported there
/// as well.
pub fn init_logging(log_level: &str, tracing_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(json_layer);

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry
            .with(telemetry_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = log_level,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized"
    );

    Ok(())
}

/// Initialize OpenTelemetry tracer with OTLP exporter
fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", "publish-scheduler"),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());
    let tracer = tracer_provider.tracer("publish-scheduler");

    tracing::info!(endpoint = endpoint, "OpenTelemetry tracer initialized");
    Ok(tracer)
}

/// Shutdown OpenTelemetry tracer provider, flushing remaining spans
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Initialize Prometheus metrics exporter and register scheduler metrics
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "transition_success_total",
        "Completed publish/unpublish transitions"
    );
    describe_counter!(
        "transition_failed_total",
        "Failed publish/unpublish transitions"
    );
    describe_histogram!(
        "transition_duration_seconds",
        "Duration of transition executions in seconds"
    );
    describe_gauge!(
        "schedule_due_entries",
        "Due entries seen by the most recent scan"
    );

    tracing::info!(metrics_port = metrics_port, "Prometheus metrics exporter initialized");
    Ok(())
}

/// Record a completed transition
#[inline]
pub fn record_transition_success(kind: ScheduleKind, outcome: CompletionOutcome) {
    counter!(
        "transition_success_total",
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a failed transition
#[inline]
pub fn record_transition_failure(kind: ScheduleKind, error: &ExecutionError) {
    let reason = match error {
        ExecutionError::TargetNotFound(_) => "target_not_found",
        ExecutionError::TransitionConflict { .. } => "transition_conflict",
        ExecutionError::ContentServiceFailed { .. } => "content_service",
        ExecutionError::AlreadyClaimed(_) => "already_claimed",
        ExecutionError::Store(_) => "store",
    };
    counter!(
        "transition_failed_total",
        "kind" => kind.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Record transition execution duration
#[inline]
pub fn record_transition_duration(kind: ScheduleKind, duration_seconds: f64) {
    histogram!("transition_duration_seconds", "kind" => kind.to_string())
        .record(duration_seconds);
}

/// Update the due-entries gauge from the latest scan
#[inline]
pub fn update_due_entries(count: i64) {
    gauge!("schedule_due_entries").set(count as f64);
}
