use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
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
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
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

    // Cache Metrics (Redis locks and queue)
    pub static ref CACHE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_operations_total",
        "Total number of cache operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref CACHE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "cache_operation_duration_seconds",
        "Cache operation duration in seconds",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    // Generation Metrics
    pub static ref TESTS_GENERATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tests_generated_total",
        "Total number of test generation requests by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref GENERATION_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "generation_attempts_total",
        "Generation attempts made by the regeneration loop",
        &["result"]
    )
    .unwrap();

    pub static ref GENERATOR_CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "generator_calls_total",
        "Total number of calls to the text generation service",
        &["status"]
    )
    .unwrap();

    pub static ref GENERATOR_CALL_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "generator_call_duration_seconds",
        "Text generation call duration in seconds",
        &["status"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 60.0, 120.0]
    )
    .unwrap();

    pub static ref QUESTIONS_DISCARDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "questions_discarded_total",
        "Candidate questions dropped during parsing or validation",
        &["stage", "reason"]
    )
    .unwrap();

    // Lifecycle Metrics
    pub static ref PROGRESS_SAVES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "progress_saves_total",
        "Total number of interim progress saves",
        &["result"]
    )
    .unwrap();

    pub static ref PROGRESS_RECORDS_HEALED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "progress_records_healed_total",
        "Stale progress records removed during reads",
        &["reason"]
    )
    .unwrap();

    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "submissions_total",
        "Total number of scored submissions",
        &["history"]
    )
    .unwrap();

    pub static ref ANALYTICS_TASKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "analytics_tasks_total",
        "Background analytics tasks by kind and outcome",
        &["kind", "status"]
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

/// Helper: track cache operation with metrics
pub async fn track_cache_operation<F, T>(operation: &str, future: F) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    CACHE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    CACHE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics() {
        TESTS_GENERATED_TOTAL.with_label_values(&["created"]).inc();

        let output = render_metrics().unwrap();
        assert!(output.contains("tests_generated_total"));
    }

    #[tokio::test]
    async fn track_db_operation_passes_result_through() {
        let value = track_db_operation("find", "unit_test", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let failed: Result<(), _> =
            track_db_operation("find", "unit_test", async { Err(anyhow::anyhow!("boom")) }).await;
        assert!(failed.is_err());
        assert_eq!(
            DB_OPERATIONS_TOTAL
                .with_label_values(&["find", "unit_test", "error"])
                .get(),
            1
        );
    }
}
