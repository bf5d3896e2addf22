use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Database Metrics (MongoDB)
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of database operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Database operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref ATTEMPTS_CREATED_TOTAL: IntCounter = register_int_counter!(
        "attempts_created_total",
        "Total number of attempts created from bookings"
    )
    .unwrap();

    pub static ref ATTEMPTS_SUBMITTED_TOTAL: IntCounter = register_int_counter!(
        "attempts_submitted_total",
        "Total number of attempts submitted"
    )
    .unwrap();

    pub static ref SECTIONS_COMPLETED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sections_completed_total",
        "Total number of attempt sections closed",
        &["section_type"]
    )
    .unwrap();

    pub static ref SECTIONS_SCORED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sections_scored_total",
        "Total number of sections auto-scored",
        &["section_type"]
    )
    .unwrap();

    pub static ref SCORING_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "scoring_failures_total",
        "Auto-scoring failures recovered at submission time",
        &["section_type"]
    )
    .unwrap();

    pub static ref BAND_MAP_MISSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "band_map_misses_total",
        "Raw scores that fell outside every band map range",
        &["section_type"]
    )
    .unwrap();

    pub static ref SECTIONS_GRADED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sections_graded_total",
        "Total number of sections graded by teachers",
        &["section_type"]
    )
    .unwrap();

    pub static ref ATTEMPTS_FULLY_GRADED_TOTAL: IntCounter = register_int_counter!(
        "attempts_fully_graded_total",
        "Attempts whose overall band has been computed"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track database operation with metrics
pub async fn track_db_operation<F, T>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();

    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}
