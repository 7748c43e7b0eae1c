use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Metric name prefix for all metrics exported by this service
const PREFIX: &str = "species_recognition";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Recognition pipeline metrics
    pub static ref RECOGNITION_OUTCOMES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_outcomes_total"),
            "Processed images by result and species resolution"
        ),
        &["result", "resolution"]
    ).expect("Failed to create outcomes_total metric");

    pub static ref RECOGNITION_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_external_calls_total"),
            "Calls to the external recognition service"
        ),
        &["call", "status"]
    ).expect("Failed to create external_calls_total metric");

    pub static ref RECOGNITION_CALL_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_external_call_duration_seconds"),
            "Duration of calls to the external recognition service, retries included"
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
        &["call"]
    ).expect("Failed to create external_call_duration_seconds metric");

    pub static ref WORKER_RUNNING: Gauge = Gauge::new(
        format!("{PREFIX}_worker_running"),
        "1 while the recognition worker loop is running"
    ).expect("Failed to create worker_running metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(RECOGNITION_OUTCOMES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RECOGNITION_CALLS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RECOGNITION_CALL_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(WORKER_RUNNING.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of one processed image
pub fn record_recognition_outcome(result: &str, resolution: &str) {
    RECOGNITION_OUTCOMES_TOTAL
        .with_label_values(&[result, resolution])
        .inc();
}

/// Record one Identify or Enrich call
pub fn record_recognition_call(call: &str, status: &str, duration: Duration) {
    RECOGNITION_CALLS_TOTAL
        .with_label_values(&[call, status])
        .inc();
    RECOGNITION_CALL_DURATION_SECONDS
        .with_label_values(&[call])
        .observe(duration.as_secs_f64());
}

pub fn set_worker_running(running: bool) {
    WORKER_RUNNING.set(if running { 1.0 } else { 0.0 });
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
