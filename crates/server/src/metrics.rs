//! Prometheus metrics endpoint.
//!
//! Serves the engine's registry plus the API error counter defined here.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! It exposes aggregate counts only (no element names, client ids or
//! subjects), but it MUST still be network-restricted to the scraper.

use artstore_sync::metrics::REGISTRY;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};
use std::sync::{LazyLock, Once};

pub static API_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "artstore_api_errors_total",
            "API error responses by error code",
        ),
        &["code"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register engine and API metrics with the global registry.
pub fn register_metrics() {
    artstore_sync::metrics::register_metrics();
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(API_ERRORS.clone()))
            .expect("metric registration failed");
    });
}

/// Handler for the /metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_handler_serves_engine_metrics() {
        register_metrics();
        artstore_sync::metrics::SYNC_LOOPS_HALTED.set(0);
        API_ERRORS.with_label_values(&["not_found"]).inc();

        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("artstore_sync_loops_halted"));
        assert!(text.contains("artstore_api_errors_total"));
    }
}
