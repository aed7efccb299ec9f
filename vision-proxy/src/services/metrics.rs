//! Prometheus metrics for vision-proxy.

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

/// All collectors, registered against one registry.
///
/// Kept as a single value so concurrent initialisation can never mix
/// collectors from different registries.
pub struct Metrics {
    pub registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub upstream_requests_total: IntCounterVec,
    pub upstream_latency_seconds: HistogramVec,
    pub upload_image_bytes: Histogram,
}

pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize all metrics. Later calls are no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;

    let http_request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["method", "path", "status"],
    )?;

    // outcome: success, or a ProviderError kind
    let upstream_requests = IntCounterVec::new(
        Opts::new("upstream_requests_total", "Total upstream chat-completion calls"),
        &["provider", "outcome"],
    )?;

    let upstream_latency = HistogramVec::new(
        HistogramOpts::new(
            "upstream_latency_seconds",
            "Upstream chat-completion latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0]),
        &["provider"],
    )?;

    let upload_bytes = Histogram::with_opts(
        HistogramOpts::new("upload_image_bytes", "Size of accepted image uploads")
            .buckets(prometheus::exponential_buckets(16_384.0, 4.0, 6)?),
    )?;

    registry.register(Box::new(http_requests_total.clone()))?;
    registry.register(Box::new(http_request_duration.clone()))?;
    registry.register(Box::new(upstream_requests.clone()))?;
    registry.register(Box::new(upstream_latency.clone()))?;
    registry.register(Box::new(upload_bytes.clone()))?;

    // A concurrent caller may have won the race; either set is complete.
    let _ = METRICS.set(Metrics {
        registry,
        http_requests_total,
        http_request_duration_seconds: http_request_duration,
        upstream_requests_total: upstream_requests,
        upstream_latency_seconds: upstream_latency,
        upload_image_bytes: upload_bytes,
    });

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match METRICS.get() {
        Some(m) => &m.registry,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

/// Record a completed HTTP request.
pub fn record_http_request(method: &str, path: &str, status: &str, duration: Duration) {
    if let Some(m) = METRICS.get() {
        m.http_requests_total
            .with_label_values(&[method, path, status])
            .inc();
        m.http_request_duration_seconds
            .with_label_values(&[method, path, status])
            .observe(duration.as_secs_f64());
    }
}

/// Record one upstream call and how it ended.
pub fn record_upstream(provider: &str, outcome: &str, duration: Duration) {
    if let Some(m) = METRICS.get() {
        m.upstream_requests_total
            .with_label_values(&[provider, outcome])
            .inc();
        m.upstream_latency_seconds
            .with_label_values(&[provider])
            .observe(duration.as_secs_f64());
    }
}

pub fn record_image_bytes(size: usize) {
    if let Some(m) = METRICS.get() {
        m.upload_image_bytes.observe(size as f64);
    }
}
