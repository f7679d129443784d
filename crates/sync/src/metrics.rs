//! Prometheus metrics for the reconciliation engine.
//!
//! The registry is shared with the HTTP server, which serves it on `/metrics`.

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static SYNC_RUNS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "artstore_sync_runs_total",
            "Completed reconciliation runs by sync kind and outcome",
        ),
        &["kind", "outcome"],
    )
    .expect("metric creation failed")
});

pub static FENCE_REJECTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "artstore_sync_fence_rejections_total",
            "Sync requests rejected because the target was already being reconciled",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static FILES_RECONCILED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "artstore_files_reconciled_total",
            "File registry changes applied by reconciliation, by change type",
        ),
        &["change"],
    )
    .expect("metric creation failed")
});

pub static SERVICE_ACCOUNTS_RECONCILED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "artstore_service_accounts_reconciled_total",
            "Service account changes applied by reconciliation, by change type",
        ),
        &["change"],
    )
    .expect("metric creation failed")
});

pub static SYNC_RUN_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "artstore_sync_run_duration_seconds",
            "Duration of one reconciliation run of one target",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static SYNC_LOOPS_HALTED: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "artstore_sync_loops_halted",
        "Scheduler loops stopped by a control-plane database failure",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(SYNC_RUNS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(FENCE_REJECTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(FILES_RECONCILED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SERVICE_ACCOUNTS_RECONCILED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SYNC_RUN_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SYNC_LOOPS_HALTED.clone()))
            .expect("metric registration failed");
    });
}

/// Add a non-zero count to a change counter.
pub(crate) fn record_changes(counter: &IntCounterVec, change: &str, count: u64) {
    if count > 0 {
        counter.with_label_values(&[change]).inc_by(count);
    }
}
