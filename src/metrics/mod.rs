//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Quote requests and failures per provider
//! - Intent execution
//! - Status polling and terminal outcomes
//! - Asset catalog cache behavior

use crate::error::{SwapError, SwapResult};
use crate::swap::{ProviderKind, SwapStatus};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::{error, info};

lazy_static! {
    // Quote metrics
    pub static ref QUOTE_REQUESTS: CounterVec = register_counter_vec!(
        "zecswap_quote_requests_total",
        "Total quote requests issued per provider and direction",
        &["provider", "direction"]
    ).unwrap();

    pub static ref QUOTE_FAILURES: CounterVec = register_counter_vec!(
        "zecswap_quote_failures_total",
        "Total failed quote requests by error kind",
        &["provider", "kind"]
    ).unwrap();

    // Execution metrics
    pub static ref INTENTS_EXECUTED: CounterVec = register_counter_vec!(
        "zecswap_intents_executed_total",
        "Total intents published",
        &["provider", "direction"]
    ).unwrap();

    pub static ref EXECUTION_FAILURES: CounterVec = register_counter_vec!(
        "zecswap_execution_failures_total",
        "Total failed intent executions by error kind",
        &["provider", "kind"]
    ).unwrap();

    // Tracking metrics
    pub static ref STATUS_POLLS: CounterVec = register_counter_vec!(
        "zecswap_status_polls_total",
        "Total status polls by observed status",
        &["provider", "status"]
    ).unwrap();

    pub static ref SWAPS_TERMINAL: CounterVec = register_counter_vec!(
        "zecswap_swaps_terminal_total",
        "Total swaps reaching a terminal status",
        &["status"]
    ).unwrap();

    pub static ref SWAPS_ACTIVE: Gauge = register_gauge!(
        "zecswap_swaps_active",
        "Swaps currently being tracked"
    ).unwrap();

    pub static ref SWAP_COMPLETION_LATENCY: HistogramVec = register_histogram_vec!(
        "zecswap_swap_completion_seconds",
        "Time from intent execution to terminal status",
        &["status"],
        vec![30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0, 3600.0]
    ).unwrap();

    // Catalog metrics
    pub static ref CATALOG_LOOKUPS: CounterVec = register_counter_vec!(
        "zecswap_catalog_lookups_total",
        "Asset catalog lookups by outcome (cache_hit, fetched, fallback)",
        &["outcome"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> SwapResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| SwapError::Internal(format!("metrics bind {addr}: {e}")))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| SwapError::Internal(format!("metrics server: {e}")))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Encode the default registry in the text exposition format
pub fn render() -> SwapResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| SwapError::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| SwapError::Internal(e.to_string()))
}

// Helper functions to record metrics

pub fn record_quote_request(provider: ProviderKind, direction: &str) {
    QUOTE_REQUESTS
        .with_label_values(&[provider.as_str(), direction])
        .inc();
}

pub fn record_quote_failure(provider: ProviderKind, err: &SwapError) {
    QUOTE_FAILURES
        .with_label_values(&[provider.as_str(), err.kind()])
        .inc();
}

pub fn record_intent_executed(provider: ProviderKind, direction: &str) {
    INTENTS_EXECUTED
        .with_label_values(&[provider.as_str(), direction])
        .inc();
}

pub fn record_execution_failure(provider: ProviderKind, err: &SwapError) {
    EXECUTION_FAILURES
        .with_label_values(&[provider.as_str(), err.kind()])
        .inc();
}

pub fn record_poll(provider: ProviderKind, status: SwapStatus) {
    STATUS_POLLS
        .with_label_values(&[provider.as_str(), status.as_str()])
        .inc();
}

pub fn record_terminal(status: SwapStatus, latency_secs: f64) {
    SWAPS_TERMINAL.with_label_values(&[status.as_str()]).inc();
    SWAP_COMPLETION_LATENCY
        .with_label_values(&[status.as_str()])
        .observe(latency_secs.max(0.0));
}

pub fn record_active_swaps(count: usize) {
    SWAPS_ACTIVE.set(count as f64);
}

pub fn record_catalog_lookup(outcome: &str) {
    CATALOG_LOOKUPS.with_label_values(&[outcome]).inc();
}
