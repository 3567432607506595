//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Probing (files examined, by classification or error kind)
//! - Conversion (outcomes and per-file duration)
//! - Safety ledger (backup lifecycle and restore failures)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Probe Metrics
// =============================================================================

/// Files probed by result.
pub static FILES_PROBED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("wavforge_files_probed_total", "Total files probed"),
        &["result"], // "canonical", "convertible", "needs_review", or a probe error kind
    )
    .unwrap()
});

// =============================================================================
// Conversion Metrics
// =============================================================================

/// Conversions by outcome.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("wavforge_conversions_total", "Total conversion attempts"),
        &["outcome"], // "converted" or a failure kind
    )
    .unwrap()
});

/// Time from backup to swap or restore, per file.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "wavforge_conversion_duration_seconds",
            "Duration of a single file conversion",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Ledger Metrics
// =============================================================================

/// Backup lifecycle events.
pub static BACKUPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("wavforge_backups_total", "Backup lifecycle events"),
        &["action"], // "created", "released", "restored"
    )
    .unwrap()
});

/// Restores that failed. Any increment means an original may be lost.
pub static RESTORE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "wavforge_restore_failures_total",
        "Restores that failed and need an operator",
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(FILES_PROBED.clone()),
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(BACKUPS_TOTAL.clone()),
        Box::new(RESTORE_FAILURES.clone()),
    ]
}
