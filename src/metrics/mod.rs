//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Conversion batch executions and issued amounts
//! - Order transitions per action
//! - Local validation rejections
//! - Backend call latency

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_counter_vec,
    CounterVec, Encoder, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Conversion metrics
    pub static ref CONVERSIONS_EXECUTED: IntCounterVec = register_int_counter_vec!(
        "hotpot_conversions_executed_total",
        "Conversion batch executions by outcome",
        &["outcome"]
    ).expect("register hotpot_conversions_executed_total");

    pub static ref UTILITY_SPENT: IntCounter = register_int_counter!(
        "hotpot_conversion_utility_spent_total",
        "Utility tokens consumed by executed conversions"
    ).expect("register hotpot_conversion_utility_spent_total");

    pub static ref SECURITY_ISSUED: IntCounter = register_int_counter!(
        "hotpot_conversion_security_issued_total",
        "Security tokens issued by executed conversions"
    ).expect("register hotpot_conversion_security_issued_total");

    pub static ref RECEIPT_DISCREPANCIES: IntCounter = register_int_counter!(
        "hotpot_conversion_receipt_discrepancies_total",
        "Receipt lines disagreeing with the locally computed summary"
    ).expect("register hotpot_conversion_receipt_discrepancies_total");

    // Order metrics
    pub static ref ORDER_TRANSITIONS: IntCounterVec = register_int_counter_vec!(
        "hotpot_order_transitions_total",
        "Order transition requests by action and outcome",
        &["action", "outcome"]
    ).expect("register hotpot_order_transitions_total");

    // Validation metrics
    pub static ref VALIDATION_REJECTIONS: IntCounterVec = register_int_counter_vec!(
        "hotpot_validation_rejections_total",
        "Requests rejected locally before reaching the backend",
        &["kind"]
    ).expect("register hotpot_validation_rejections_total");

    // Backend metrics
    pub static ref BACKEND_LATENCY: HistogramVec = register_histogram_vec!(
        "hotpot_backend_call_seconds",
        "Backend call latency by operation and outcome",
        &["operation", "outcome"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).expect("register hotpot_backend_call_seconds");

    // Health metrics
    pub static ref HEALTH_CHECKS: CounterVec = register_counter_vec!(
        "hotpot_health_checks_total",
        "Backend health checks by result",
        &["result"]
    ).expect("register hotpot_health_checks_total");
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> std::io::Result<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Encode the default registry in the text exposition format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

// Helper functions to record metrics

pub fn record_conversion_executed(utility_spent: u128, security_issued: u128) {
    CONVERSIONS_EXECUTED.with_label_values(&["ok"]).inc();
    UTILITY_SPENT.inc_by(u64::try_from(utility_spent).unwrap_or(u64::MAX));
    SECURITY_ISSUED.inc_by(u64::try_from(security_issued).unwrap_or(u64::MAX));
}

pub fn record_conversion_failed(code: &str) {
    CONVERSIONS_EXECUTED.with_label_values(&[code]).inc();
}

pub fn record_receipt_discrepancies(count: usize) {
    RECEIPT_DISCREPANCIES.inc_by(count as u64);
}

pub fn record_order_transition(action: &str, outcome: &str) {
    ORDER_TRANSITIONS
        .with_label_values(&[action, outcome])
        .inc();
}

pub fn record_validation_rejection(kind: &str) {
    VALIDATION_REJECTIONS.with_label_values(&[kind]).inc();
}

pub fn record_backend_call(operation: &str, outcome: &str, latency_secs: f64) {
    BACKEND_LATENCY
        .with_label_values(&[operation, outcome])
        .observe(latency_secs);
}

pub fn record_health_check(healthy: bool) {
    HEALTH_CHECKS
        .with_label_values(&[if healthy { "ok" } else { "failed" }])
        .inc();
}
