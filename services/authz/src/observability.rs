//! Logging, trace propagation and the Prometheus endpoint of the authz service.
//!
//! # Purpose
//! - Structured logs through `tracing-subscriber`, filtered by `KEYWARD_LOG`
//!   (falling back to `RUST_LOG`, then `info`).
//! - OTLP span export, enabled only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
//! - W3C trace-context extraction so request spans join the caller's trace.
//! - A Prometheus recorder with help text for every `keyward_*` metric the
//!   service emits, served on its own listener.
//!
//! Initialization runs once per process; later calls return the same handle.
use axum::Router;
use axum::http::HeaderMap;
use metrics::{Unit, describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::KeyValue;
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const LOG_FILTER_ENV: &str = "KEYWARD_LOG";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub fn init_observability(service_name: &str) -> PrometheusHandle {
    TRACING_INIT.get_or_init(|| {
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true));
        match otlp_endpoint().and_then(|endpoint| span_exporter(service_name, &endpoint)) {
            Some(provider) => {
                let tracer = provider.tracer(service_name.to_string());
                opentelemetry::global::set_tracer_provider(provider);
                let _ = registry
                    .with(tracing_opentelemetry::layer().with_tracer(tracer))
                    .try_init();
            }
            None => {
                let _ = registry.try_init();
            }
        }
    });
    install_metrics_recorder()
}

fn otlp_endpoint() -> Option<String> {
    std::env::var(OTLP_ENDPOINT_ENV)
        .ok()
        .map(|endpoint| endpoint.trim().to_string())
        .filter(|endpoint| !endpoint.is_empty())
}

fn span_exporter(service_name: &str, endpoint: &str) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .ok()?;
    let resource = opentelemetry_sdk::Resource::builder_empty()
        .with_attributes(resource_attributes(service_name))
        .build();
    Some(
        SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource)
            .build(),
    )
}

fn resource_attributes(service_name: &str) -> Vec<KeyValue> {
    let mut attrs = vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ];
    if let Ok(instance) =
        std::env::var("KEYWARD_SERVICE_INSTANCE_ID").or_else(|_| std::env::var("HOSTNAME"))
    {
        attrs.push(KeyValue::new("service.instance.id", instance));
    }
    if let Ok(environment) = std::env::var("KEYWARD_ENVIRONMENT") {
        attrs.push(KeyValue::new("deployment.environment", environment));
    }
    attrs
}

/// Parent context carried by `traceparent`/`tracestate`, or an empty context.
pub fn trace_context_from_headers(headers: &HeaderMap) -> opentelemetry::Context {
    TraceContextPropagator::new().extract(&HeaderExtractor(headers))
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

fn install_metrics_recorder() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            match metrics::set_global_recorder(recorder) {
                Ok(()) => describe_metrics(),
                Err(err) => tracing::warn!(error = %err, "metrics recorder already installed"),
            }
            handle
        })
        .clone()
}

fn describe_metrics() {
    describe_counter!(
        "keyward_relation_writes_total",
        Unit::Count,
        "Relation mutations applied to store and backend, by op"
    );
    describe_counter!(
        "keyward_permission_checks_total",
        Unit::Count,
        "Single permission checks, by outcome (allowed, denied, error)"
    );
    describe_counter!(
        "keyward_bulk_checks_total",
        Unit::Count,
        "Bulk check batches, by outcome (ok, error, cancelled, rejected)"
    );
    describe_counter!(
        "keyward_reconcile_propagated_total",
        Unit::Count,
        "Stored relations re-added to the backend by reconciliation"
    );
    describe_counter!(
        "keyward_reconcile_failures_total",
        Unit::Count,
        "Stored relations reconciliation failed to re-add"
    );
    describe_counter!(
        "keyward_activity_log_failures_total",
        Unit::Count,
        "Audit entries the activity sink rejected"
    );
    describe_gauge!(
        "keyward_relations_total",
        Unit::Count,
        "Relations held by the in-memory store"
    );
}

pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

pub async fn serve_metrics(handle: PrometheusHandle, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics listening");
    axum::serve(listener, metrics_router(handle).into_make_service()).await
}
